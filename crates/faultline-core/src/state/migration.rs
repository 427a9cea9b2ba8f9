use rusqlite::Connection;

use crate::error::{FaultlineError, Result};

use super::SqliteStateStore;

const MIGRATION_SCHEMA_SQL: &str = r"
    PRAGMA journal_mode = WAL;
    PRAGMA foreign_keys = ON;
    CREATE TABLE IF NOT EXISTS error_reports (
        id TEXT PRIMARY KEY,
        message TEXT NOT NULL,
        error_code TEXT,
        stack_trace TEXT,
        url TEXT,
        user_agent TEXT,
        user_id TEXT,
        session_id TEXT,
        module TEXT NOT NULL,
        function_name TEXT,
        version TEXT,
        environment TEXT NOT NULL CHECK(environment IN ('development', 'test', 'production')),
        severity TEXT NOT NULL CHECK(severity IN ('low', 'medium', 'high', 'critical')),
        category TEXT NOT NULL CHECK(category IN (
            'frontend', 'backend', 'api', 'database', 'network', 'security', 'performance'
        )),
        tags_json TEXT NOT NULL DEFAULT '[]',
        additional_data_json TEXT NOT NULL DEFAULT '{}',
        fingerprint TEXT NOT NULL,
        ip_address TEXT,
        browser_info_json TEXT NOT NULL DEFAULT '{}',
        reported_at TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_error_reports_created_at
    ON error_reports(created_at);

    CREATE INDEX IF NOT EXISTS idx_error_reports_fingerprint
    ON error_reports(fingerprint, created_at);

    CREATE TABLE IF NOT EXISTS error_aggregations (
        fingerprint TEXT PRIMARY KEY,
        message TEXT NOT NULL,
        module TEXT NOT NULL,
        severity TEXT NOT NULL,
        category TEXT NOT NULL,
        count INTEGER NOT NULL CHECK(count > 0),
        first_seen TEXT NOT NULL,
        last_seen TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS audit_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        event_type TEXT NOT NULL,
        event_action TEXT NOT NULL,
        event_category TEXT NOT NULL,
        actor_type TEXT NOT NULL,
        actor_id TEXT,
        actor_ip TEXT,
        target_type TEXT NOT NULL,
        target_id TEXT,
        event_data_json TEXT NOT NULL,
        event_result TEXT NOT NULL,
        event_message TEXT NOT NULL,
        module_name TEXT NOT NULL,
        function_name TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_audit_log_created_at
    ON audit_log(created_at DESC);

    CREATE TABLE IF NOT EXISTS api_keys (
        id TEXT PRIMARY KEY,
        key_hash TEXT NOT NULL UNIQUE,
        key_prefix TEXT NOT NULL,
        name TEXT NOT NULL,
        permissions_json TEXT NOT NULL DEFAULT '[]',
        expires_at TEXT,
        last_used_at TEXT,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS rate_limits (
        key TEXT PRIMARY KEY,
        window_started_ms INTEGER NOT NULL,
        request_count INTEGER NOT NULL
    );
";

impl SqliteStateStore {
    pub fn migrate(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| FaultlineError::lock_poisoned("sqlite"))?;
        conn.execute_batch(MIGRATION_SCHEMA_SQL)?;
        ensure_required_column(
            &conn,
            "error_reports",
            "created_at",
            "unsupported error_reports schema: created_at is missing; reset the state database",
        )?;
        ensure_required_column(
            &conn,
            "error_aggregations",
            "first_seen",
            "unsupported error_aggregations schema: first_seen is missing; reset the state database",
        )?;
        ensure_required_column(
            &conn,
            "api_keys",
            "permissions_json",
            "unsupported api_keys schema: permissions_json is missing; reset the state database",
        )?;
        drop(conn);
        Ok(())
    }
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for row in rows {
        if row? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn ensure_required_column(
    conn: &Connection,
    table: &str,
    column: &str,
    error_message: &'static str,
) -> Result<()> {
    if has_column(conn, table, column)? {
        Ok(())
    } else {
        Err(FaultlineError::Persistence(error_message.to_string()))
    }
}
