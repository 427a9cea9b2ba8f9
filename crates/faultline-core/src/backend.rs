//! Contracts for the collaborators the ingestion and statistics paths consume.
//!
//! Operations take these as injected values; nothing here is a process-wide
//! singleton. `SqliteStateStore` implements the storage-backed ones.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{
    AggregationUpdate, ApiKeyPrincipal, AuditRecord, CriticalAlert, ErrorAggregation,
    StatsDimension, StoredError,
};

pub trait ReportStore: Send + Sync {
    /// Persist one occurrence.
    fn insert_report(&self, record: &StoredError) -> Result<()>;

    /// Increment-or-insert the aggregate for `update.fingerprint` as one
    /// atomic write.
    fn upsert_aggregation(&self, update: &AggregationUpdate) -> Result<()>;

    fn find_report(&self, id: &str) -> Result<Option<StoredError>>;

    fn find_aggregation(&self, fingerprint: &str) -> Result<Option<ErrorAggregation>>;

    fn count_since(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    fn count_by(
        &self,
        dimension: StatsDimension,
        cutoff: DateTime<Utc>,
    ) -> Result<BTreeMap<String, u64>>;

    fn top_errors(&self, cutoff: DateTime<Utc>, limit: usize) -> Result<Vec<ErrorAggregation>>;

    fn ping(&self) -> Result<()>;
}

/// String-keyed cache with per-entry expiry.
pub trait StatsCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String, ttl: Duration);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_after: Duration,
}

pub trait RateLimiter: Send + Sync {
    /// Count one request against `key` and report whether it fits the budget.
    /// Check and increment happen as one atomic step.
    fn check_and_increment(&self, key: &str, limit: u32, window: Duration)
    -> Result<RateDecision>;
}

pub trait AuditSink: Send + Sync {
    fn append(&self, record: &AuditRecord) -> Result<()>;
}

pub trait Escalator: Send + Sync {
    fn escalate(&self, alert: &CriticalAlert) -> Result<()>;
}

pub trait ApiKeyStore: Send + Sync {
    /// Resolve a presented key. Unknown, revoked and expired keys are `None`.
    fn verify_api_key(&self, raw_key: &str, now: DateTime<Utc>) -> Result<Option<ApiKeyPrincipal>>;
}
