// Public fallible APIs in this crate share one concrete error contract (`FaultlineError`).
#![allow(
    clippy::missing_errors_doc,
    reason = "crate-wide fallible API uses one explicit error type; per-item boilerplate would duplicate contract"
)]

pub mod backend;
pub mod cache;
pub mod config;
pub mod effects;
pub mod error;
pub mod fingerprint;
pub mod ingest;
pub mod models;
pub mod state;
pub mod stats;
pub mod time_range;
pub mod validate;

pub use cache::MemoryStatsCache;
pub use config::ServiceConfig;
pub use error::{ErrorKind, ErrorPayload, FaultlineError, FieldIssue, Result};
pub use ingest::{IngestContext, IngestPipeline, IngestReceipt};
pub use state::SqliteStateStore;
pub use stats::StatsEngine;
pub use time_range::TimeRange;
