//! Error types for the loader
//!
//! Every variant is fatal to the file job that raised it. Partial acceptance
//! from the store is not an error; it feeds the best-effort retry loop.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for loader operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Main error type for the loader
#[derive(Error, Debug)]
pub enum IngestError {
    /// A line could not be parsed or mapped into a record
    #[error("Failed to decode line {line}: {reason}")]
    DecodeFailed { line: u64, reason: String },

    /// The store rejected or errored on a write call
    #[error("Write failed: {0}")]
    WriteFailed(#[source] StoreError),

    /// The input file could not be opened or decompressed
    #[error("Source unavailable: {}: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration is missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),
}

impl IngestError {
    pub fn decode(line: u64, reason: impl Into<String>) -> Self {
        Self::DecodeFailed {
            line,
            reason: reason.into(),
        }
    }

    pub fn source_unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SourceUnavailable {
            path: path.into(),
            source,
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<StoreError> for IngestError {
    fn from(err: StoreError) -> Self {
        Self::WriteFailed(err)
    }
}

/// Errors raised at the store boundary
#[derive(Error, Debug)]
pub enum StoreError {
    /// The service call itself failed (connectivity, throttling exhausted, validation)
    #[error("{operation} call failed: {message}")]
    Service {
        operation: &'static str,
        message: String,
    },

    /// The service answered with something the loader cannot interpret
    #[error("Malformed {operation} response: {message}")]
    MalformedResponse {
        operation: &'static str,
        message: String,
    },

    /// Items were still unprocessed after the retry ceiling was reached
    #[error("{remaining} items still unprocessed after {attempts} continuation attempts")]
    RetriesExhausted { remaining: usize, attempts: u32 },

    /// The transaction was rejected as a whole
    #[error("Transaction of {items} items rejected: {message}")]
    TransactionRejected { items: usize, message: String },
}

impl StoreError {
    pub fn service(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Service {
            operation,
            message: err.to_string(),
        }
    }

    pub fn malformed(operation: &'static str, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            operation,
            message: message.into(),
        }
    }
}
