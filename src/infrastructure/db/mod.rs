pub mod sqlite;

use crate::domain::analysis::{StoredGrouped, StoredPaired};
use crate::domain::dataset::{GroupedRecord, PairedRecord};
use crate::domain::error::Result;
use async_trait::async_trait;

/// Persistence for accepted datasets. Only records that passed every check reach it.
#[async_trait]
pub trait DatasetStore {
    /// Store header and rows together; returns the new id.
    async fn save_grouped(&self, record: &GroupedRecord) -> Result<i64>;
    async fn save_paired(&self, record: &PairedRecord) -> Result<i64>;
    async fn find_grouped(&self, id: i64) -> Result<Option<StoredGrouped>>;
    async fn find_paired(&self, id: i64) -> Result<Option<StoredPaired>>;
}
