pub mod ingestion;
pub mod shape_validator;
pub mod variance_guard;
