//! Store write boundary
//!
//! The loader only needs three calls from the key-value store. Keeping them
//! behind [`ItemStore`] lets the batching and retry logic run against an
//! in-memory fake in tests and against DynamoDB in production.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::record::Record;

pub mod config;
pub mod dynamodb;

pub use config::StoreConfig;
pub use dynamodb::DynamoStore;

/// Items per batch-put call accepted by the store
pub const MAX_BATCH_PUT_ITEMS: usize = 25;

/// Items per transactional write accepted by the store
pub const MAX_TRANSACT_ITEMS: usize = 100;

/// Result of one batch-put call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchPutOutcome {
    /// Items durably written by this call
    pub accepted: usize,
    /// Items the store declined this time and that must be resubmitted
    pub unprocessed: Vec<Record>,
}

impl BatchPutOutcome {
    pub fn is_complete(&self) -> bool {
        self.unprocessed.is_empty()
    }
}

/// Write operations the loader issues against a table
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Put up to [`MAX_BATCH_PUT_ITEMS`] items; some may come back unprocessed
    async fn batch_put(&self, table: &str, items: Vec<Record>) -> Result<BatchPutOutcome, StoreError>;

    /// Resubmit items a previous call reported as unprocessed
    async fn batch_put_continue(
        &self,
        table: &str,
        unprocessed: Vec<Record>,
    ) -> Result<BatchPutOutcome, StoreError>;

    /// Put up to [`MAX_TRANSACT_ITEMS`] items atomically
    async fn transact_write(&self, table: &str, items: Vec<Record>) -> Result<(), StoreError>;
}
