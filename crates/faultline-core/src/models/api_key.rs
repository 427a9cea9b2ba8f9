use chrono::{DateTime, Utc};
use serde::Serialize;

/// Freshly issued key. `api_key` is the only copy of the secret.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedApiKey {
    pub id: String,
    pub api_key: String,
    pub key_prefix: String,
    pub name: String,
    pub permissions: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyPrincipal {
    pub key_id: String,
    pub key_prefix: String,
    pub name: String,
    pub permissions: Vec<String>,
}
