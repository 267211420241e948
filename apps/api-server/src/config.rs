//! Environment-driven configuration (spec §6).
//!
//! Every field is read once at startup via [`ApiConfig::load`]; nothing in
//! this process re-reads the environment afterwards. Defaults match the
//! values spec §6 documents for local/dev use — production deployments are
//! expected to set all of these explicitly.

use std::env;
use std::str::FromStr;

use pos_core::RoundingMethod;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("missing required environment variable {0}")]
    MissingRequired(&'static str),
}

/// Top-level process configuration, assembled once in `main`.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub mongodb_uri: String,
    pub db_name_prefix: String,
    pub redis_url: String,

    pub secret_key: String,
    pub algorithm: String,
    pub token_expire_minutes: i64,

    pub use_item_cache: bool,
    pub item_cache_ttl_seconds: u64,

    pub grpc_timeout_seconds: u64,
    pub round_method_for_discount: RoundingMethod,

    pub slack_webhook_url: Option<String>,
    pub pubsub_notify_api_key: String,
    pub alert_cooldown_seconds: i64,

    pub debug: bool,
    pub debug_port: u16,
}

impl ApiConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let port: u16 = parse_env("PORT", "8080")?;
        let config = ApiConfig {
            bind_addr: format!("0.0.0.0:{port}"),
            mongodb_uri: required_env("MONGODB_URI")?,
            db_name_prefix: env::var("DB_NAME_PREFIX").unwrap_or_else(|_| "pos".to_string()),
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string()),

            secret_key: required_env("SECRET_KEY")?,
            algorithm: env::var("ALGORITHM").unwrap_or_else(|_| "HS256".to_string()),
            token_expire_minutes: parse_env("TOKEN_EXPIRE_MINUTES", "30")?,

            use_item_cache: parse_env("USE_ITEM_CACHE", "true")?,
            item_cache_ttl_seconds: parse_env("ITEM_CACHE_TTL_SECONDS", "60")?,

            grpc_timeout_seconds: parse_env("GRPC_TIMEOUT", "10")?,
            round_method_for_discount: parse_rounding_method()?,

            slack_webhook_url: env::var("SLACK_WEBHOOK_URL").ok().filter(|s| !s.is_empty()),
            pubsub_notify_api_key: env::var("PUBSUB_NOTIFY_API_KEY").unwrap_or_default(),
            alert_cooldown_seconds: parse_env("ALERT_COOLDOWN_SECONDS", "300")?,

            debug: parse_env("DEBUG", "false")?,
            debug_port: parse_env("DEBUG_PORT", "9229")?,
        };

        if config.algorithm != "HS256" && config.algorithm != "HS384" && config.algorithm != "HS512" {
            return Err(ConfigError::InvalidValue {
                field: "ALGORITHM",
                reason: format!("unsupported JWT algorithm {}", config.algorithm),
            });
        }

        Ok(config)
    }
}

fn required_env(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingRequired(key))
}

fn parse_env<T>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>().map_err(|e| ConfigError::InvalidValue { field: key, reason: e.to_string() })
}

fn parse_rounding_method() -> Result<RoundingMethod, ConfigError> {
    let raw = env::var("ROUND_METHOD_FOR_DISCOUNT").unwrap_or_else(|_| "HalfUp".to_string());
    raw.parse::<RoundingMethod>()
        .map_err(|_| ConfigError::InvalidValue { field: "ROUND_METHOD_FOR_DISCOUNT", reason: raw })
}
