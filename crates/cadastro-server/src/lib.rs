//! Cadastro Server Library
//!
//! Moves person records from CSV files in an object store onto a Kafka topic.
//!
//! # Overview
//!
//! - **Storage**: read-only gateway to the bucket holding input files (S3-compatible)
//! - **Ingest**: CSV parsing, the per-file pipeline and the periodic trigger
//! - **Publisher**: keyed JSON messages over a broker client (Kafka)
//! - **API**: manual processing and liveness endpoints (axum)
//! - **Configuration**: environment-based configuration management
//!
//! # Pipeline
//!
//! ```text
//! list bucket -> filter by suffix -> for each file:
//!     read object -> parse rows -> publish every record -> outcome
//! ```
//!
//! A bad row is skipped and logged; a failed file yields a failed outcome and
//! the pass moves on. Nothing in the pipeline retries on its own: the next
//! scheduled pass picks the file up again.

pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod middleware;
pub mod publisher;
pub mod storage;
