use chrono::{DateTime, Duration, Utc};
use rusqlite::{OptionalExtension, params};
use uuid::Uuid;

use crate::error::{FaultlineError, Result};
use crate::models::{ApiKeyPrincipal, IssuedApiKey};

use super::{SqliteStateStore, format_timestamp, parse_json_column, parse_timestamp};

const API_KEY_PREFIX_CHARS: usize = 8;
const MAX_API_KEY_NAME_CHARS: usize = 100;

impl SqliteStateStore {
    /// Issue a new key. Only its blake3 digest is stored; the returned value is
    /// the one chance to see the secret.
    pub fn create_api_key(
        &self,
        name: &str,
        permissions: &[String],
        expires_in_days: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<IssuedApiKey> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FaultlineError::Validation(
                "api key name must not be empty".to_string(),
            ));
        }
        if name.chars().count() > MAX_API_KEY_NAME_CHARS {
            return Err(FaultlineError::Validation(format!(
                "api key name must be at most {MAX_API_KEY_NAME_CHARS} characters"
            )));
        }
        if permissions.iter().any(|permission| permission.trim().is_empty()) {
            return Err(FaultlineError::Validation(
                "api key permissions must not be empty".to_string(),
            ));
        }

        let api_key = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        let key_prefix = api_key[..API_KEY_PREFIX_CHARS].to_string();
        let key_hash = hash_api_key(&api_key);
        let id = Uuid::new_v4().to_string();
        let expires_at = expires_in_days
            .and_then(|days| now.checked_add_signed(Duration::days(i64::from(days))));
        let permissions_json = serde_json::to_string(permissions)?;

        self.with_conn(|conn| {
            conn.execute(
                "
                INSERT INTO api_keys(
                  id, key_hash, key_prefix, name, permissions_json, expires_at, created_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ",
                params![
                    id,
                    key_hash,
                    key_prefix,
                    name,
                    permissions_json,
                    expires_at.map(format_timestamp),
                    format_timestamp(now),
                ],
            )?;
            Ok(())
        })?;

        tracing::info!(key_id = %id, key_prefix = %key_prefix, name, "api key created");
        Ok(IssuedApiKey {
            id,
            api_key,
            key_prefix,
            name: name.to_string(),
            permissions: permissions.to_vec(),
            expires_at,
            created_at: now,
        })
    }

    pub fn lookup_api_key(
        &self,
        raw_key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ApiKeyPrincipal>> {
        let raw_key = raw_key.trim();
        if raw_key.is_empty() {
            return Ok(None);
        }
        let key_hash = hash_api_key(raw_key);
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "
                    SELECT id, key_prefix, name, permissions_json, expires_at
                    FROM api_keys
                    WHERE key_hash = ?1
                    ",
                    params![key_hash],
                    |row| {
                        let permissions_json = row.get::<_, String>(3)?;
                        let expires_at = row
                            .get::<_, Option<String>>(4)?
                            .map(|raw| parse_timestamp(4, &raw))
                            .transpose()?;
                        Ok((
                            ApiKeyPrincipal {
                                key_id: row.get(0)?,
                                key_prefix: row.get(1)?,
                                name: row.get(2)?,
                                permissions: parse_json_column(3, &permissions_json)?,
                            },
                            expires_at,
                        ))
                    },
                )
                .optional()?;

            let Some((principal, expires_at)) = row else {
                return Ok(None);
            };
            if expires_at.is_some_and(|expires_at| expires_at <= now) {
                return Ok(None);
            }
            conn.execute(
                "UPDATE api_keys SET last_used_at = ?2 WHERE id = ?1",
                params![principal.key_id, format_timestamp(now)],
            )?;
            Ok(Some(principal))
        })
    }
}

fn hash_api_key(raw_key: &str) -> String {
    blake3::hash(raw_key.as_bytes()).to_hex().to_string()
}
