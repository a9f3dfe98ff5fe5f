//! Dynaload Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared utilities for the dynaload workspace members.
//!
//! - **Logging**: `tracing` subscriber setup for console, rolling files or both
//!
//! # Example
//!
//! ```no_run
//! use dynaload_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     init_logging(&LogConfig::from_env()?)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

pub mod logging;
