use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::backend::StatsCache;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// In-process TTL cache shared by every statistics request.
///
/// Entries are only ever dropped by expiry; writes to storage do not
/// invalidate them.
#[derive(Clone, Default)]
pub struct MemoryStatsCache {
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
}

impl std::fmt::Debug for MemoryStatsCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStatsCache").finish_non_exhaustive()
    }
}

impl MemoryStatsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StatsCache for MemoryStatsCache {
    fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().ok()?;
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set(&self, key: &str, value: String, ttl: Duration) {
        let Ok(mut entries) = self.entries.lock() else {
            tracing::warn!(key, "stats cache lock poisoned; skipping write");
            return;
        };
        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: now + ttl,
            },
        );
    }
}
