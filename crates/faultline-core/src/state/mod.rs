use std::collections::BTreeMap;
use std::path::Path;
#[cfg(unix)]
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use rusqlite::types::Type;

use crate::backend::{ApiKeyStore, AuditSink, RateDecision, RateLimiter, ReportStore};
use crate::error::{FaultlineError, Result};
use crate::models::{
    AggregationUpdate, ApiKeyPrincipal, AuditRecord, ErrorAggregation, StatsDimension,
    StoredError,
};

mod aggregation;
mod api_keys;
mod audit;
mod codec;
mod migration;
mod rate_limit;
mod reports;

/// SQLite-backed storage for reports, aggregates, audit records, API keys and
/// rate-limit counters. Clones share one connection.
#[derive(Clone)]
pub struct SqliteStateStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStateStore").finish_non_exhaustive()
    }
}

impl SqliteStateStore {
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| FaultlineError::lock_poisoned("sqlite"))?;
        f(&conn)
    }

    fn with_tx<T>(&self, f: impl FnOnce(&rusqlite::Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| FaultlineError::lock_poisoned("sqlite"))?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        drop(conn);
        Ok(value)
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.migrate()?;
        #[cfg(unix)]
        harden_sqlite_permissions(path)?;
        Ok(store)
    }
}

impl ReportStore for SqliteStateStore {
    fn insert_report(&self, record: &StoredError) -> Result<()> {
        self.insert_error_report(record)
    }

    fn upsert_aggregation(&self, update: &AggregationUpdate) -> Result<()> {
        self.upsert_error_aggregation(update)
    }

    fn find_report(&self, id: &str) -> Result<Option<StoredError>> {
        self.get_error_report(id)
    }

    fn find_aggregation(&self, fingerprint: &str) -> Result<Option<ErrorAggregation>> {
        self.get_error_aggregation(fingerprint)
    }

    fn count_since(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.count_reports_since(cutoff)
    }

    fn count_by(
        &self,
        dimension: StatsDimension,
        cutoff: DateTime<Utc>,
    ) -> Result<BTreeMap<String, u64>> {
        self.count_reports_by(dimension, cutoff)
    }

    fn top_errors(&self, cutoff: DateTime<Utc>, limit: usize) -> Result<Vec<ErrorAggregation>> {
        self.top_error_groups(cutoff, limit)
    }

    fn ping(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
    }
}

impl AuditSink for SqliteStateStore {
    fn append(&self, record: &AuditRecord) -> Result<()> {
        self.append_audit_record(record)
    }
}

impl RateLimiter for SqliteStateStore {
    fn check_and_increment(
        &self,
        key: &str,
        limit: u32,
        window: std::time::Duration,
    ) -> Result<RateDecision> {
        self.check_and_increment_at(key, limit, window, Utc::now().timestamp_millis())
    }
}

impl ApiKeyStore for SqliteStateStore {
    fn verify_api_key(&self, raw_key: &str, now: DateTime<Utc>) -> Result<Option<ApiKeyPrincipal>> {
        self.lookup_api_key(raw_key, now)
    }
}

/// Fixed-width UTC rendering so stored timestamps order correctly as text.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

pub(crate) fn parse_json_column<T: serde::de::DeserializeOwned>(
    idx: usize,
    raw: &str,
) -> rusqlite::Result<T> {
    serde_json::from_str(raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn count_to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

fn usize_to_i64_saturating(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(unix)]
fn harden_sqlite_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    for suffix in ["", "-wal", "-shm"] {
        let mut os = path.as_os_str().to_os_string();
        os.push(suffix);
        let candidate = PathBuf::from(os);
        if candidate.exists() {
            std::fs::set_permissions(candidate, std::fs::Permissions::from_mode(0o600))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests;
