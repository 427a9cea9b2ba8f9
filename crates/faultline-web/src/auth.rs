//! Credential checks for the privileged read path.
//!
//! Two credential forms are accepted: an HS256 bearer token, or an API key
//! presented in `X-API-Key` or as `Authorization: ApiKey <key>`.

use axum::http::{HeaderMap, header};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use faultline_core::backend::ApiKeyStore;
use faultline_core::config::JwtConfig;
use faultline_core::{FaultlineError, Result};

use crate::gateway::header_str;

pub const READ_ERROR_STATS: &str = "read:error-stats";

const SUPERUSER_PERMISSIONS: [&str; 2] = ["admin", "*"];

/// Claims extracted from a valid JWT.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: u64,
    #[serde(default)]
    pub iat: Option<u64>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    Jwt,
    ApiKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
    pub kind: CredentialKind,
    pub permissions: Vec<String>,
}

impl Principal {
    pub fn has_permission(&self, required: &str) -> bool {
        self.permissions.iter().any(|granted| {
            granted == required || SUPERUSER_PERMISSIONS.contains(&granted.as_str())
        })
    }
}

enum Credential<'h> {
    Bearer(&'h str),
    ApiKey(&'h str),
}

pub struct Authenticator<'a> {
    jwt: Option<&'a JwtConfig>,
    api_keys: &'a dyn ApiKeyStore,
}

impl<'a> Authenticator<'a> {
    pub fn new(jwt: Option<&'a JwtConfig>, api_keys: &'a dyn ApiKeyStore) -> Self {
        Self { jwt, api_keys }
    }

    /// Authenticate the request and require `permission`.
    pub fn require(
        &self,
        headers: &HeaderMap,
        permission: &str,
        now: DateTime<Utc>,
    ) -> Result<Principal> {
        let principal = self.authenticate(headers, now)?;
        if principal.has_permission(permission) {
            Ok(principal)
        } else {
            tracing::debug!(subject = %principal.subject, permission, "permission denied");
            Err(FaultlineError::PermissionDenied(format!(
                "missing permission {permission}"
            )))
        }
    }

    pub fn authenticate(&self, headers: &HeaderMap, now: DateTime<Utc>) -> Result<Principal> {
        match extract_credential(headers) {
            None => Err(FaultlineError::Unauthenticated(
                "missing credentials".to_string(),
            )),
            Some(Credential::Bearer(token)) => self.authenticate_bearer(token),
            Some(Credential::ApiKey(key)) => self.authenticate_api_key(key, now),
        }
    }

    fn authenticate_bearer(&self, token: &str) -> Result<Principal> {
        let Some(config) = self.jwt else {
            return Err(FaultlineError::Unauthenticated(
                "bearer tokens are not accepted".to_string(),
            ));
        };
        let claims = validate_token(token, config).map_err(|err| {
            tracing::debug!(error = %err, "JWT validation failed");
            FaultlineError::Unauthenticated("invalid bearer token".to_string())
        })?;

        let mut permissions = claims.permissions;
        if let Some(scope) = claims.scope.as_deref() {
            permissions.extend(scope.split_whitespace().map(ToString::to_string));
        }
        Ok(Principal {
            subject: claims.sub,
            kind: CredentialKind::Jwt,
            permissions,
        })
    }

    fn authenticate_api_key(&self, key: &str, now: DateTime<Utc>) -> Result<Principal> {
        let principal = self
            .api_keys
            .verify_api_key(key, now)?
            .ok_or_else(|| {
                FaultlineError::Unauthenticated("invalid or expired api key".to_string())
            })?;
        Ok(Principal {
            subject: format!("api-key:{}", principal.key_prefix),
            kind: CredentialKind::ApiKey,
            permissions: principal.permissions,
        })
    }
}

fn extract_credential(headers: &HeaderMap) -> Option<Credential<'_>> {
    if let Some(key) = header_str(headers, "x-api-key")
        .map(str::trim)
        .filter(|key| !key.is_empty())
    {
        return Some(Credential::ApiKey(key));
    }

    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())?;
    let (scheme, value) = authorization.trim().split_once(' ')?;
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if scheme.eq_ignore_ascii_case("bearer") {
        Some(Credential::Bearer(value))
    } else if scheme.eq_ignore_ascii_case("apikey") {
        Some(Credential::ApiKey(value))
    } else {
        None
    }
}

fn validate_token(
    token: &str,
    config: &JwtConfig,
) -> std::result::Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    if let Some(issuer) = config.issuer.as_deref() {
        validation.set_issuer(&[issuer]);
    }
    if let Some(audience) = config.audience.as_deref() {
        validation.set_audience(&[audience]);
    } else {
        validation.validate_aud = false;
    }

    let key = DecodingKey::from_secret(config.secret.as_bytes());
    decode::<Claims>(token, &key, &validation).map(|data| data.claims)
}
