use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AppError {
    Internal(String),
    NotFound(String),
    BadRequest(String),
    /// Text that no number notation accepted. Carries the offending text.
    NumberParse(String),
    ShapeViolation(String),
    VarianceViolation(String),
    CorruptFile(String),
    DatabaseError(String),
    IoError(String),
}

impl AppError {
    /// The bare human-readable reason, without the category prefix used by `Display`.
    pub fn reason(&self) -> String {
        match self {
            AppError::NumberParse(text) => format!("'{}' is not a valid number", text),
            AppError::Internal(msg)
            | AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::ShapeViolation(msg)
            | AppError::VarianceViolation(msg)
            | AppError::CorruptFile(msg)
            | AppError::DatabaseError(msg)
            | AppError::IoError(msg) => msg.clone(),
        }
    }

    /// Whether the failure is the caller's fault (bad data or bad request).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::BadRequest(_)
                | AppError::NumberParse(_)
                | AppError::ShapeViolation(_)
                | AppError::VarianceViolation(_)
                | AppError::CorruptFile(_)
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NumberParse(text) => {
                write!(f, "Parse error: '{}' is not a valid number", text)
            }
            AppError::ShapeViolation(msg) => write!(f, "Shape violation: {}", msg),
            AppError::VarianceViolation(msg) => write!(f, "Variance violation: {}", msg),
            AppError::CorruptFile(msg) => write!(f, "Corrupt file: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
