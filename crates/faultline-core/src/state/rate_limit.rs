use std::time::Duration;

use rusqlite::{OptionalExtension, params};

use crate::backend::RateDecision;
use crate::error::Result;

use super::SqliteStateStore;

impl SqliteStateStore {
    /// Fixed-window counter. The window opens with the first request for `key`
    /// and rejected requests are not counted against the next window.
    pub fn check_and_increment_at(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
        now_ms: i64,
    ) -> Result<RateDecision> {
        let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
        self.with_tx(|tx| {
            let current = tx
                .query_row(
                    "SELECT window_started_ms, request_count FROM rate_limits WHERE key = ?1",
                    params![key],
                    |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
                )
                .optional()?;

            let (window_started_ms, count) = match current {
                Some((started, count)) if now_ms.saturating_sub(started) < window_ms => {
                    (started, u32::try_from(count).unwrap_or(u32::MAX))
                }
                _ => (now_ms, 0),
            };
            let reset_after = Duration::from_millis(
                u64::try_from(window_started_ms.saturating_add(window_ms).saturating_sub(now_ms))
                    .unwrap_or_default(),
            );

            if count >= limit {
                return Ok(RateDecision {
                    allowed: false,
                    limit,
                    remaining: 0,
                    reset_after,
                });
            }

            let count = count + 1;
            tx.execute(
                "
                INSERT INTO rate_limits(key, window_started_ms, request_count)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(key) DO UPDATE SET
                  window_started_ms = excluded.window_started_ms,
                  request_count = excluded.request_count
                ",
                params![key, window_started_ms, i64::from(count)],
            )?;
            Ok(RateDecision {
                allowed: true,
                limit,
                remaining: limit - count,
                reset_after,
            })
        })
    }
}
