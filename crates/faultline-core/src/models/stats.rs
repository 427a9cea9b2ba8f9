use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::report::{Category, Severity};

/// Running per-fingerprint summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorAggregation {
    pub fingerprint: String,
    pub message: String,
    pub module: String,
    pub severity: Severity,
    pub category: Category,
    pub count: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Values written by one aggregate upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationUpdate {
    pub fingerprint: String,
    pub message: String,
    pub module: String,
    pub severity: Severity,
    pub category: Category,
    pub seen_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorStats {
    pub total_errors: u64,
    pub errors_by_category: BTreeMap<String, u64>,
    pub errors_by_severity: BTreeMap<String, u64>,
    pub errors_by_module: BTreeMap<String, u64>,
    pub recent_error_rate: u64,
    pub top_errors: Vec<ErrorAggregation>,
}

/// Column a grouped count is broken down by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsDimension {
    Category,
    Severity,
    Module,
}

impl StatsDimension {
    pub const fn column(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Severity => "severity",
            Self::Module => "module",
        }
    }
}
