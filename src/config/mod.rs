//! Configuration module for the org-chart backend.
//!
//! All configuration is loaded from environment variables (optionally via a `.env`
//! file) with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const ENV_API_KEY: &str = "ORGCHART_API_KEY";
pub const ENV_DB_PATH: &str = "ORGCHART_DB_PATH";
pub const ENV_INDEX_PATH: &str = "ORGCHART_INDEX_PATH";
pub const ENV_BIND_ADDR: &str = "ORGCHART_BIND_ADDR";
pub const ENV_LOG_LEVEL: &str = "ORGCHART_LOG_LEVEL";

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared API key; `None` disables authentication
    pub api_key: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Path to the employee directory index
    pub index_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, std::net::AddrParseError> {
        dotenvy::dotenv().ok();

        let api_key = env::var(ENV_API_KEY).ok().filter(|k| !k.is_empty());

        let db_path = env::var(ENV_DB_PATH)
            .unwrap_or_else(|_| "./data/orgchart.sqlite".to_string())
            .into();

        let index_path = env::var(ENV_INDEX_PATH)
            .unwrap_or_else(|_| "./data/index".to_string())
            .into();

        let bind_addr = env::var(ENV_BIND_ADDR)
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
            .parse()?;

        let log_level = env::var(ENV_LOG_LEVEL).unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            api_key,
            db_path,
            index_path,
            bind_addr,
            log_level,
        })
    }
}
