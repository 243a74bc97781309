use std::{env, fmt::Display, fs::read_to_string, path::PathBuf, str::FromStr};

use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173,https://notebookhub.vercel.app";
pub const DEFAULT_MAX_UPLOAD_BYTES: &str = "10485760";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key} value: {reason}")]
    Invalid { key: String, reason: String },

    #[error("Secret {0} not found in /run/secrets or the environment")]
    MissingSecret(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "redis" => Ok(StoreBackend::Redis),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend {other}, expected redis or memory")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub store: StoreBackend,
    pub redis_url: String,
    pub jwt_secret: String,
    pub admin_username: String,
    pub admin_password: String,
    pub token_ttl_secs: i64,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub protect_edits: bool,
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let cors_origins: String = try_load("CORS_ORIGINS", DEFAULT_CORS_ORIGINS)?;

        Ok(Self {
            port: try_load("RUST_PORT", "3001")?,
            store: try_load("STORE_BACKEND", "redis")?,
            redis_url: try_load("REDIS_URL", "redis://localhost:6379")?,
            jwt_secret: read_secret("JWT_SECRET")?,
            admin_username: try_load("ADMIN_USERNAME", "admin")?,
            admin_password: read_secret("ADMIN_PASSWORD")?,
            token_ttl_secs: try_load("TOKEN_TTL_SECS", "3600")?,
            upload_dir: try_load("UPLOAD_DIR", "uploads")?,
            max_upload_bytes: try_load("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            protect_edits: try_load("PROTECT_EDITS", "true")?,
            cors_origins: split_list(&cors_origins),
        })
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");

            ConfigError::Invalid {
                key: key.to_string(),
                reason: e.to_string(),
            }
        })
}

/// Docker secret first, plain environment variable as a fallback for local runs.
fn read_secret(secret_name: &str) -> Result<String, ConfigError> {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .or_else(|e| {
            warn!("Failed to read {secret_name} from file: {e}");
            env::var(secret_name).map(|s| s.trim().to_string())
        })
        .ok()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConfigError::MissingSecret(secret_name.to_string()))
}

pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
