use rusqlite::{OptionalExtension, Row, params};

use crate::error::Result;
use crate::models::StoredError;

use super::{SqliteStateStore, format_timestamp, parse_json_column, parse_timestamp};

const REPORT_COLUMNS: &str = "
    id, message, error_code, stack_trace, url, user_agent, user_id, session_id,
    module, function_name, version, environment, severity, category, tags_json,
    additional_data_json, fingerprint, ip_address, browser_info_json, reported_at, created_at
";

impl SqliteStateStore {
    pub fn insert_error_report(&self, record: &StoredError) -> Result<()> {
        let tags_json = serde_json::to_string(&record.tags)?;
        let additional_data_json = serde_json::to_string(&record.additional_data)?;
        let browser_info_json = serde_json::to_string(&record.browser_info)?;
        self.with_conn(|conn| {
            conn.execute(
                "
                INSERT INTO error_reports(
                  id, message, error_code, stack_trace, url, user_agent, user_id, session_id,
                  module, function_name, version, environment, severity, category, tags_json,
                  additional_data_json, fingerprint, ip_address, browser_info_json,
                  reported_at, created_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                        ?16, ?17, ?18, ?19, ?20, ?21)
                ",
                params![
                    record.id,
                    record.message,
                    record.error_code,
                    record.stack,
                    record.url,
                    record.user_agent,
                    record.user_id,
                    record.session_id,
                    record.module,
                    record.function,
                    record.version,
                    record.environment,
                    record.severity,
                    record.category,
                    tags_json,
                    additional_data_json,
                    record.fingerprint,
                    record.ip_address,
                    browser_info_json,
                    format_timestamp(record.reported_at),
                    format_timestamp(record.created_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_error_report(&self, id: &str) -> Result<Option<StoredError>> {
        self.with_conn(|conn| {
            let record = conn
                .query_row(
                    &format!("SELECT {REPORT_COLUMNS} FROM error_reports WHERE id = ?1"),
                    params![id],
                    row_to_stored_error,
                )
                .optional()?;
            Ok(record)
        })
    }
}

fn row_to_stored_error(row: &Row<'_>) -> rusqlite::Result<StoredError> {
    let tags_json = row.get::<_, String>(14)?;
    let additional_data_json = row.get::<_, String>(15)?;
    let browser_info_json = row.get::<_, String>(18)?;
    let reported_at = row.get::<_, String>(19)?;
    let created_at = row.get::<_, String>(20)?;
    Ok(StoredError {
        id: row.get(0)?,
        message: row.get(1)?,
        error_code: row.get(2)?,
        stack: row.get(3)?,
        url: row.get(4)?,
        user_agent: row.get(5)?,
        user_id: row.get(6)?,
        session_id: row.get(7)?,
        module: row.get(8)?,
        function: row.get(9)?,
        version: row.get(10)?,
        environment: row.get(11)?,
        severity: row.get(12)?,
        category: row.get(13)?,
        tags: parse_json_column(14, &tags_json)?,
        additional_data: parse_json_column(15, &additional_data_json)?,
        fingerprint: row.get(16)?,
        ip_address: row.get(17)?,
        browser_info: parse_json_column(18, &browser_info_json)?,
        reported_at: parse_timestamp(19, &reported_at)?,
        created_at: parse_timestamp(20, &created_at)?,
    })
}
