use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::report::ErrorReport;

const AUDIT_MESSAGE_PREVIEW_CHARS: usize = 100;

/// Append-only audit trail entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub event_type: String,
    pub event_action: String,
    pub event_category: String,
    pub actor_type: String,
    pub actor_id: Option<String>,
    pub actor_ip: Option<String>,
    pub target_type: String,
    pub target_id: Option<String>,
    pub event_data: serde_json::Value,
    pub event_result: String,
    pub event_message: String,
    pub module_name: String,
    pub function_name: String,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn error_reported(
        error_id: &str,
        fingerprint: &str,
        report: &ErrorReport,
        actor_id: Option<&str>,
        actor_ip: Option<&str>,
        now: DateTime<Utc>,
    ) -> Self {
        let preview = report
            .message
            .chars()
            .take(AUDIT_MESSAGE_PREVIEW_CHARS)
            .collect::<String>();
        Self {
            event_type: "error_reported".to_string(),
            event_action: "create".to_string(),
            event_category: "system".to_string(),
            actor_type: if actor_id.is_some() { "user" } else { "system" }.to_string(),
            actor_id: actor_id.map(ToString::to_string),
            actor_ip: actor_ip.map(ToString::to_string),
            target_type: "error_report".to_string(),
            target_id: Some(error_id.to_string()),
            event_data: json!({
                "fingerprint": fingerprint,
                "severity": report.severity.as_str(),
                "category": report.category.as_str(),
                "module": report.module,
            }),
            event_result: "success".to_string(),
            event_message: format!("Error reported: {preview}"),
            module_name: "core".to_string(),
            function_name: "error_reporting".to_string(),
            created_at: now,
        }
    }

    pub fn stats_accessed(
        subject: &str,
        actor_ip: Option<&str>,
        target_id: Option<&str>,
        time_range: Option<&str>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type: "error_stats_accessed".to_string(),
            event_action: "read".to_string(),
            event_category: "access".to_string(),
            actor_type: "principal".to_string(),
            actor_id: Some(subject.to_string()),
            actor_ip: actor_ip.map(ToString::to_string),
            target_type: if target_id.is_some() {
                "error_report"
            } else {
                "error_stats"
            }
            .to_string(),
            target_id: target_id.map(ToString::to_string),
            event_data: json!({ "time_range": time_range }),
            event_result: "success".to_string(),
            event_message: format!("Error statistics read by {subject}"),
            module_name: "core".to_string(),
            function_name: "error_reporting".to_string(),
            created_at: now,
        }
    }
}

/// Out-of-band notice raised for critical-severity ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CriticalAlert {
    pub error_id: String,
    pub fingerprint: String,
    pub message: String,
    pub module: String,
    pub category: String,
    pub reported_at: DateTime<Utc>,
}
