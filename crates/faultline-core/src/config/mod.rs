use std::path::PathBuf;
use std::time::Duration;

use crate::models::Environment;

mod env;

pub const DB_PATH_ENV: &str = "FAULTLINE_DB_PATH";
pub const HOST_ENV: &str = "FAULTLINE_HOST";
pub const PORT_ENV: &str = "FAULTLINE_PORT";
pub const RATE_LIMIT_REQUESTS_ENV: &str = "FAULTLINE_RATE_LIMIT_REQUESTS";
pub const RATE_LIMIT_WINDOW_MS_ENV: &str = "FAULTLINE_RATE_LIMIT_WINDOW_MS";
pub const STATS_CACHE_TTL_SECS_ENV: &str = "FAULTLINE_STATS_CACHE_TTL_SECS";
pub const JWT_SECRET_ENV: &str = "FAULTLINE_JWT_SECRET";
pub const JWT_ISSUER_ENV: &str = "FAULTLINE_JWT_ISSUER";
pub const JWT_AUDIENCE_ENV: &str = "FAULTLINE_JWT_AUDIENCE";
pub const ENVIRONMENT_ENV: &str = "FAULTLINE_ENVIRONMENT";
pub const EFFECT_QUEUE_CAPACITY_ENV: &str = "FAULTLINE_EFFECT_QUEUE_CAPACITY";
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

pub const DEFAULT_DB_PATH: &str = ".faultline/faultline.sqlite3";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8787;
pub const DEFAULT_RATE_LIMIT_REQUESTS: u32 = 30;
pub const DEFAULT_RATE_LIMIT_WINDOW_MS: u64 = 60_000;
pub const DEFAULT_STATS_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_EFFECT_QUEUE_CAPACITY: usize = 1024;
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub requests: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: DEFAULT_RATE_LIMIT_REQUESTS,
            window: Duration::from_millis(DEFAULT_RATE_LIMIT_WINDOW_MS),
        }
    }
}

/// HS256 bearer-token settings. Absent when no secret is configured, which
/// leaves API keys as the only accepted credential.
#[derive(Clone, PartialEq, Eq)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub rate_limit: RateLimitConfig,
    pub stats_cache_ttl: Duration,
    pub jwt: Option<JwtConfig>,
    pub environment: Environment,
    /// Pending audit and escalation effects the gateway buffers before it
    /// starts dropping them.
    pub effect_queue_capacity: usize,
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            rate_limit: RateLimitConfig::default(),
            stats_cache_ttl: Duration::from_secs(DEFAULT_STATS_CACHE_TTL_SECS),
            jwt: None,
            environment: Environment::Development,
            effect_queue_capacity: DEFAULT_EFFECT_QUEUE_CAPACITY,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl ServiceConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Unset or unparseable values
    /// keep their defaults.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let jwt = env::non_empty(lookup(JWT_SECRET_ENV)).map(|secret| JwtConfig {
            secret,
            issuer: env::non_empty(lookup(JWT_ISSUER_ENV)),
            audience: env::non_empty(lookup(JWT_AUDIENCE_ENV)),
        });
        Self {
            db_path: env::non_empty(lookup(DB_PATH_ENV))
                .map_or(defaults.db_path, PathBuf::from),
            host: env::non_empty(lookup(HOST_ENV)).unwrap_or(defaults.host),
            port: env::parse_u16(lookup(PORT_ENV)).unwrap_or(defaults.port),
            rate_limit: RateLimitConfig {
                requests: env::parse_u32_min(lookup(RATE_LIMIT_REQUESTS_ENV), 1)
                    .unwrap_or(defaults.rate_limit.requests),
                window: env::parse_u64_min(lookup(RATE_LIMIT_WINDOW_MS_ENV), 1)
                    .map_or(defaults.rate_limit.window, Duration::from_millis),
            },
            stats_cache_ttl: env::parse_u64_min(lookup(STATS_CACHE_TTL_SECS_ENV), 0)
                .map_or(defaults.stats_cache_ttl, Duration::from_secs),
            jwt,
            environment: env::non_empty(lookup(ENVIRONMENT_ENV))
                .and_then(|raw| Environment::parse(&raw.to_ascii_lowercase()))
                .unwrap_or(defaults.environment),
            effect_queue_capacity: env::parse_usize_min(lookup(EFFECT_QUEUE_CAPACITY_ENV), 1)
                .unwrap_or(defaults.effect_queue_capacity),
            log_level: env::parse_log_level(lookup(LOG_LEVEL_ENV)).unwrap_or(defaults.log_level),
        }
    }

    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
