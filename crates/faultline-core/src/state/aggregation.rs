use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};

use crate::error::Result;
use crate::models::{AggregationUpdate, ErrorAggregation, StatsDimension};

use super::{
    SqliteStateStore, count_to_u64, format_timestamp, parse_timestamp, usize_to_i64_saturating,
};

impl SqliteStateStore {
    /// Single-statement increment-or-insert. Concurrent writers serialize on the
    /// row, so the count never loses an update and the seen bounds only widen.
    pub fn upsert_error_aggregation(&self, update: &AggregationUpdate) -> Result<()> {
        let seen_at = format_timestamp(update.seen_at);
        self.with_conn(|conn| {
            conn.execute(
                "
                INSERT INTO error_aggregations(
                  fingerprint, message, module, severity, category, count, first_seen, last_seen
                )
                VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)
                ON CONFLICT(fingerprint) DO UPDATE SET
                  count = error_aggregations.count + 1,
                  message = excluded.message,
                  module = excluded.module,
                  severity = excluded.severity,
                  category = excluded.category,
                  first_seen = MIN(error_aggregations.first_seen, excluded.first_seen),
                  last_seen = MAX(error_aggregations.last_seen, excluded.last_seen)
                ",
                params![
                    update.fingerprint,
                    update.message,
                    update.module,
                    update.severity,
                    update.category,
                    seen_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_error_aggregation(&self, fingerprint: &str) -> Result<Option<ErrorAggregation>> {
        self.with_conn(|conn| {
            let aggregation = conn
                .query_row(
                    "
                    SELECT fingerprint, message, module, severity, category, count,
                           first_seen, last_seen
                    FROM error_aggregations
                    WHERE fingerprint = ?1
                    ",
                    params![fingerprint],
                    row_to_aggregation,
                )
                .optional()?;
            Ok(aggregation)
        })
    }

    pub fn count_reports_since(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM error_reports WHERE created_at >= ?1",
                params![format_timestamp(cutoff)],
                |row| row.get::<_, i64>(0),
            )?;
            Ok(count_to_u64(count))
        })
    }

    pub fn count_reports_by(
        &self,
        dimension: StatsDimension,
        cutoff: DateTime<Utc>,
    ) -> Result<BTreeMap<String, u64>> {
        let column = dimension.column();
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "
                SELECT {column}, COUNT(*)
                FROM error_reports
                WHERE created_at >= ?1
                GROUP BY {column}
                "
            ))?;
            let rows = stmt.query_map(params![format_timestamp(cutoff)], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            let mut counts = BTreeMap::new();
            for row in rows {
                let (value, count) = row?;
                counts.insert(value, count_to_u64(count));
            }
            Ok(counts)
        })
    }

    /// Most frequent groups among occurrences inside the window. Counts are
    /// window-scoped; `first_seen` and `last_seen` describe the occurrences in
    /// the window as well.
    pub fn top_error_groups(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ErrorAggregation>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "
                SELECT fingerprint, message, module, severity, category, COUNT(*) AS count,
                       MIN(created_at) AS first_seen, MAX(created_at) AS last_seen
                FROM error_reports
                WHERE created_at >= ?1
                GROUP BY fingerprint, message, module, severity, category
                ORDER BY count DESC, last_seen DESC, fingerprint ASC
                LIMIT ?2
                ",
            )?;
            let rows = stmt.query_map(
                params![format_timestamp(cutoff), usize_to_i64_saturating(limit)],
                row_to_aggregation,
            )?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }
}

fn row_to_aggregation(row: &Row<'_>) -> rusqlite::Result<ErrorAggregation> {
    let first_seen = row.get::<_, String>(6)?;
    let last_seen = row.get::<_, String>(7)?;
    Ok(ErrorAggregation {
        fingerprint: row.get(0)?,
        message: row.get(1)?,
        module: row.get(2)?,
        severity: row.get(3)?,
        category: row.get(4)?,
        count: count_to_u64(row.get::<_, i64>(5)?),
        first_seen: parse_timestamp(6, &first_seen)?,
        last_seen: parse_timestamp(7, &last_seen)?,
    })
}
