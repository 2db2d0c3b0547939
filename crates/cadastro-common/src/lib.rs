//! Cadastro Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, error handling and logging for the cadastro ingestion bridge.
//!
//! # Overview
//!
//! - **Error Handling**: the ingestion error taxonomy and result alias
//! - **Types**: the record published to the broker and the per-file outcome
//! - **Logging**: `tracing` subscriber setup shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use cadastro_common::types::PersonRecord;
//!
//! let record = PersonRecord::new("Ana", 30, "SP", "cad/pessoas.csv");
//! assert!(!record.message_id.is_empty());
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{IngestError, Result};
pub use types::{OutcomeCounts, PersonRecord, ProcessingOutcome};
