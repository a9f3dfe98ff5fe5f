//! Dynaload Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Bulk-loads DynamoDB export files (gzip, one JSON item per line) into a
//! table using bounded batch or transactional writes.
//!
//! # Pipeline
//!
//! - **source**: reads and decodes one export file
//! - **batch**: groups records into write-sized batches
//! - **writer**: submits a batch and resolves it to full acceptance
//! - **progress**: shared grand total and milestone reporting
//! - **job**: drives one file end to end
//! - **orchestrator**: runs jobs for a whole directory
//!
//! # Example
//!
//! ```no_run
//! use dynaload_ingest::{config::LoaderConfig, orchestrator::Orchestrator, store::{DynamoStore, StoreConfig}};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store_config = StoreConfig::for_local("http://localhost:8000");
//!     let store = Arc::new(DynamoStore::new(&store_config).await);
//!     let config = LoaderConfig::new("./export", "orders", store_config);
//!     config.validate()?;
//!
//!     let summary = Orchestrator::from_config(&config, store, CancellationToken::new())?
//!         .run_dir(&config.source_dir)
//!         .await?;
//!     println!("{} items", summary.grand_total);
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod job;
pub mod orchestrator;
pub mod progress;
pub mod record;
pub mod source;
pub mod store;
pub mod writer;

// Re-export commonly used types
pub use error::{IngestError, Result, StoreError};
pub use record::Record;
