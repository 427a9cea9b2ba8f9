use rusqlite::params;

use crate::error::Result;
use crate::models::AuditRecord;

use super::{
    SqliteStateStore, format_timestamp, parse_json_column, parse_timestamp,
    usize_to_i64_saturating,
};

impl SqliteStateStore {
    pub fn append_audit_record(&self, record: &AuditRecord) -> Result<()> {
        let event_data_json = serde_json::to_string(&record.event_data)?;
        self.with_conn(|conn| {
            conn.execute(
                "
                INSERT INTO audit_log(
                  event_type, event_action, event_category, actor_type, actor_id, actor_ip,
                  target_type, target_id, event_data_json, event_result, event_message,
                  module_name, function_name, created_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                ",
                params![
                    record.event_type,
                    record.event_action,
                    record.event_category,
                    record.actor_type,
                    record.actor_id,
                    record.actor_ip,
                    record.target_type,
                    record.target_id,
                    event_data_json,
                    record.event_result,
                    record.event_message,
                    record.module_name,
                    record.function_name,
                    format_timestamp(record.created_at),
                ],
            )?;
            Ok(())
        })
    }

    /// Newest first.
    pub fn list_audit_records(&self, limit: usize) -> Result<Vec<AuditRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "
                SELECT event_type, event_action, event_category, actor_type, actor_id, actor_ip,
                       target_type, target_id, event_data_json, event_result, event_message,
                       module_name, function_name, created_at
                FROM audit_log
                ORDER BY id DESC
                LIMIT ?1
                ",
            )?;
            let rows = stmt.query_map(params![usize_to_i64_saturating(limit)], |row| {
                let event_data_json = row.get::<_, String>(8)?;
                let created_at = row.get::<_, String>(13)?;
                Ok(AuditRecord {
                    event_type: row.get(0)?,
                    event_action: row.get(1)?,
                    event_category: row.get(2)?,
                    actor_type: row.get(3)?,
                    actor_id: row.get(4)?,
                    actor_ip: row.get(5)?,
                    target_type: row.get(6)?,
                    target_id: row.get(7)?,
                    event_data: parse_json_column(8, &event_data_json)?,
                    event_result: row.get(9)?,
                    event_message: row.get(10)?,
                    module_name: row.get(11)?,
                    function_name: row.get(12)?,
                    created_at: parse_timestamp(13, &created_at)?,
                })
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }
}
