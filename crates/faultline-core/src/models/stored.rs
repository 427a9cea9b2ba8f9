use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::report::{BrowserInfo, Category, Environment, ErrorReport, Severity};

/// Environment recorded for reports that did not name one.
pub const DEFAULT_STORED_ENVIRONMENT: Environment = Environment::Production;

/// One persisted error occurrence. Written once per ingestion, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredError {
    pub id: String,
    pub message: String,
    pub error_code: Option<String>,
    pub stack: Option<String>,
    pub url: Option<String>,
    pub user_agent: Option<String>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub module: String,
    pub function: Option<String>,
    pub version: Option<String>,
    pub environment: Environment,
    pub severity: Severity,
    pub category: Category,
    pub tags: Vec<String>,
    pub additional_data: serde_json::Map<String, serde_json::Value>,
    pub fingerprint: String,
    pub ip_address: Option<String>,
    pub browser_info: BrowserInfo,
    pub reported_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl StoredError {
    pub fn from_report(
        id: String,
        report: &ErrorReport,
        fingerprint: String,
        ip_address: Option<String>,
        fallback_user_agent: Option<&str>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            message: report.message.clone(),
            error_code: report.error_code.clone(),
            stack: report.stack.clone(),
            url: report.url.clone(),
            user_agent: report
                .user_agent
                .clone()
                .or_else(|| fallback_user_agent.map(ToString::to_string)),
            user_id: report.user_id.clone(),
            session_id: report.session_id.clone(),
            module: report.module.clone(),
            function: report.function.clone(),
            version: report.version.clone(),
            environment: report.environment.unwrap_or(DEFAULT_STORED_ENVIRONMENT),
            severity: report.severity,
            category: report.category,
            tags: report.tags.clone(),
            additional_data: report.additional_data.clone(),
            fingerprint,
            ip_address,
            browser_info: report.browser_info.clone().unwrap_or_default(),
            reported_at: report.timestamp.unwrap_or(now),
            created_at: now,
        }
    }
}
