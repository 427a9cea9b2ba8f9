use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::backend::{ReportStore, StatsCache};
use crate::error::{FaultlineError, Result};
use crate::models::{ErrorStats, StatsDimension, StoredError};
use crate::time_range::TimeRange;

pub const DEFAULT_STATS_CACHE_TTL: Duration = Duration::from_secs(300);
pub const TOP_ERRORS_LIMIT: usize = 10;

const RECENT_RATE_WINDOW: TimeRange = TimeRange::ONE_HOUR;
const CACHE_KEY_PREFIX: &str = "error_stats:";

/// Read path. Aggregate statistics go through the cache; single-report lookups
/// never do.
pub struct StatsEngine<'a> {
    store: &'a dyn ReportStore,
    cache: &'a dyn StatsCache,
    ttl: Duration,
}

impl<'a> StatsEngine<'a> {
    pub fn new(store: &'a dyn ReportStore, cache: &'a dyn StatsCache) -> Self {
        Self {
            store,
            cache,
            ttl: DEFAULT_STATS_CACHE_TTL,
        }
    }

    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn get_stats(&self, time_range: &str) -> Result<ErrorStats> {
        self.get_stats_at(time_range, Utc::now())
    }

    /// Cached statistics for `time_range`. A hit is returned as stored, even if
    /// newer reports exist; entries only go away when their TTL runs out.
    pub fn get_stats_at(&self, time_range: &str, now: DateTime<Utc>) -> Result<ErrorStats> {
        let key = cache_key(time_range);
        if let Some(cached) = self.cache.get(&key) {
            match serde_json::from_str::<ErrorStats>(&cached) {
                Ok(stats) => return Ok(stats),
                Err(err) => {
                    tracing::warn!(key = %key, error = %err, "discarding undecodable stats cache entry");
                }
            }
        }

        let stats = compute_stats(self.store, TimeRange::parse(time_range), now).inspect_err(
            |err| tracing::error!(time_range, error = %err, "failed to compute error statistics"),
        )?;
        self.cache.set(&key, serde_json::to_string(&stats)?, self.ttl);
        Ok(stats)
    }

    pub fn get_error_by_id(&self, id: &str) -> Result<StoredError> {
        self.store
            .find_report(id)?
            .ok_or_else(|| FaultlineError::NotFound(format!("error report {id}")))
    }
}

pub fn cache_key(time_range: &str) -> String {
    format!("{CACHE_KEY_PREFIX}{time_range}")
}

/// Uncached statistics straight from storage.
pub fn compute_stats(
    store: &dyn ReportStore,
    range: TimeRange,
    now: DateTime<Utc>,
) -> Result<ErrorStats> {
    let cutoff = range.cutoff(now);
    Ok(ErrorStats {
        total_errors: store.count_since(cutoff)?,
        errors_by_category: store.count_by(StatsDimension::Category, cutoff)?,
        errors_by_severity: store.count_by(StatsDimension::Severity, cutoff)?,
        errors_by_module: store.count_by(StatsDimension::Module, cutoff)?,
        top_errors: store.top_errors(cutoff, TOP_ERRORS_LIMIT)?,
        recent_error_rate: store.count_since(RECENT_RATE_WINDOW.cutoff(now))?,
    })
}
