use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|value| value.as_str() == raw)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Frontend,
    #[default]
    Backend,
    Api,
    Database,
    Network,
    Security,
    Performance,
}

impl Category {
    pub const ALL: [Self; 7] = [
        Self::Frontend,
        Self::Backend,
        Self::Api,
        Self::Database,
        Self::Network,
        Self::Security,
        Self::Performance,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Frontend => "frontend",
            Self::Backend => "backend",
            Self::Api => "api",
            Self::Database => "database",
            Self::Network => "network",
            Self::Security => "security",
            Self::Performance => "performance",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|value| value.as_str() == raw)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl Environment {
    pub const ALL: [Self; 3] = [Self::Development, Self::Test, Self::Production];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Test => "test",
            Self::Production => "production",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|value| value.as_str() == raw)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

/// Error report exactly as submitted, before any schema checks.
///
/// Every field is optional so that a missing value, or a string outside its
/// allowed set, turns into a field-level validation issue. A value of the wrong
/// JSON type (`"severity": 5`, `"tags": "x"`) still fails to decode and is
/// reported as a malformed body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawErrorReport {
    pub message: Option<String>,
    pub error_code: Option<String>,
    pub stack: Option<String>,
    pub url: Option<String>,
    pub user_agent: Option<String>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub module: Option<String>,
    pub function: Option<String>,
    pub version: Option<String>,
    pub environment: Option<String>,
    pub severity: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub additional_data: Option<serde_json::Value>,
    pub fingerprint: Option<String>,
    pub timestamp: Option<String>,
    pub browser_info: Option<BrowserInfo>,
}

impl RawErrorReport {
    pub fn from_json_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

/// A validated error report. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
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
    pub environment: Option<Environment>,
    pub severity: Severity,
    pub category: Category,
    pub tags: Vec<String>,
    pub additional_data: serde_json::Map<String, serde_json::Value>,
    pub fingerprint: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub browser_info: Option<BrowserInfo>,
}

impl ErrorReport {
    /// Minimal report with schema defaults for every optional field.
    pub fn new(message: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_code: None,
            stack: None,
            url: None,
            user_agent: None,
            user_id: None,
            session_id: None,
            module: module.into(),
            function: None,
            version: None,
            environment: None,
            severity: Severity::default(),
            category: Category::default(),
            tags: Vec::new(),
            additional_data: serde_json::Map::new(),
            fingerprint: None,
            timestamp: None,
            browser_info: None,
        }
    }

    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    #[must_use]
    pub fn with_function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }

    #[must_use]
    pub fn with_error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    #[must_use]
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }
}
