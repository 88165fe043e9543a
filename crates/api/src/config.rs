//! Process configuration, read from environment variables.

use std::fmt;
use std::path::PathBuf;

use chrono::Duration;
use thiserror::Error;

use bookstore_auth::{TokenSettings, DEFAULT_IDENTITY_TTL_MINUTES};

pub const DEFAULT_ISSUER: &str = "bookstore-api";
pub const DEFAULT_AUDIENCE: &str = "bookstore-clients";
pub const DEFAULT_TOKEN_MINUTES: i64 = 60;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required setting {0} is missing or empty")]
    Missing(&'static str),

    #[error("setting {name} has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Credentials for the startup-seeded administrator.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub jwt_expires_in_minutes: i64,
    pub user_cache_ttl_minutes: i64,
    pub bind_addr: String,
    pub database_url: Option<String>,
    pub upload_dir: PathBuf,
    pub upload_remove_all: bool,
    pub admin: Option<AdminCredentials>,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("jwt_secret", &"<redacted>")
            .field("jwt_issuer", &self.jwt_issuer)
            .field("jwt_audience", &self.jwt_audience)
            .field("jwt_expires_in_minutes", &self.jwt_expires_in_minutes)
            .field("user_cache_ttl_minutes", &self.user_cache_ttl_minutes)
            .field("bind_addr", &self.bind_addr)
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("upload_dir", &self.upload_dir)
            .field("upload_remove_all", &self.upload_remove_all)
            .field("admin", &self.admin)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source. Blank
    /// values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let admin = match (get("ADMIN_USERNAME"), get("ADMIN_PASSWORD")) {
            (Some(username), Some(password)) => Some(AdminCredentials { username, password }),
            _ => None,
        };

        Ok(Self {
            jwt_secret,
            jwt_issuer: get("JWT_ISSUER").unwrap_or_else(|| DEFAULT_ISSUER.to_string()),
            jwt_audience: get("JWT_AUDIENCE").unwrap_or_else(|| DEFAULT_AUDIENCE.to_string()),
            jwt_expires_in_minutes: positive_minutes(
                "JWT_EXPIRES_IN_MINUTES",
                get("JWT_EXPIRES_IN_MINUTES"),
                DEFAULT_TOKEN_MINUTES,
            )?,
            user_cache_ttl_minutes: positive_minutes(
                "USER_CACHE_TTL_MINUTES",
                get("USER_CACHE_TTL_MINUTES"),
                DEFAULT_IDENTITY_TTL_MINUTES,
            )?,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            database_url: get("DATABASE_URL"),
            upload_dir: get("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR)),
            upload_remove_all: flag("UPLOAD_REMOVE_ALL", get("UPLOAD_REMOVE_ALL"))?,
            admin,
        })
    }

    pub fn token_settings(&self) -> TokenSettings {
        TokenSettings {
            secret: self.jwt_secret.clone(),
            issuer: self.jwt_issuer.clone(),
            audience: self.jwt_audience.clone(),
            lifetime: Duration::minutes(self.jwt_expires_in_minutes),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::minutes(self.user_cache_ttl_minutes)
    }
}

fn positive_minutes(
    name: &'static str,
    raw: Option<String>,
    default: i64,
) -> Result<i64, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().parse::<i64>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(ConfigError::Invalid {
            name,
            value: raw,
            reason: "expected a positive integer",
        }),
    }
}

fn flag(name: &'static str, raw: Option<String>) -> Result<bool, ConfigError> {
    let Some(raw) = raw else {
        return Ok(false);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: raw,
            reason: "expected true or false",
        }),
    }
}
