//! File ingestion
//!
//! # Architecture
//!
//! - **config**: ingestion settings (`INGEST_*` environment variables)
//! - **parser**: delimited text to [`PersonRecord`](cadastro_common::PersonRecord)s
//! - **orchestrator**: per-file pipeline and discovery passes
//! - **scheduler**: periodic trigger for discovery passes
//!
//! Manual processing of a single file is exposed over HTTP by
//! `POST /api/cadastro/process` (see [`crate::api`]).

pub mod config;
pub mod orchestrator;
pub mod parser;
pub mod scheduler;

pub use config::{IngestConfig, PublishFailurePolicy};
pub use orchestrator::{IngestOrchestrator, PassSummary};
pub use parser::{ParsedFile, RecordParser, RowRejection};
pub use scheduler::Scheduler;
