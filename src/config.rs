//! Configuration for Wayrest.
//!
//! Environment variable handling using clap. The embedding application parses
//! this once at startup and hands it to [`crate::app::AppContext::init`].

use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use clap::Parser;

use crate::auth::BackendKind;

/// Wayrest - data synchronization and session layer
#[derive(Parser, Debug, Clone)]
#[command(name = "wayrest")]
#[command(about = "Data synchronization and session layer for the Wayrest app")]
pub struct Config {
    /// Document store connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// Document store database name
    #[arg(long, env = "MONGODB_DB", default_value = "wayrest")]
    pub mongodb_db: String,

    /// Base URL of the managed identity provider REST API
    #[arg(long, env = "IDENTITY_URL", default_value = "https://identitytoolkit.googleapis.com/v1")]
    pub identity_url: String,

    /// API key for the managed identity provider (required for the managed backend)
    #[arg(long, env = "IDENTITY_API_KEY")]
    pub identity_api_key: Option<String>,

    /// Base URL of the secondary mobile REST API
    #[arg(long, env = "API_BASE_URL", default_value = "")]
    pub api_base_url: String,

    /// Postgres connection string for the direct-credential backend.
    /// Absence disables the direct backend, not the whole layer.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Which auth backend is authoritative for this process
    #[arg(long, env = "AUTH_BACKEND", value_enum, default_value = "managed")]
    pub auth_backend: BackendKind,

    /// Directory for the encrypted secure store
    #[arg(long, env = "SECURE_STORE_DIR", default_value = ".wayrest")]
    pub secure_store_dir: PathBuf,

    /// Base64-encoded 32-byte master key for the secure store
    /// (required in production; a dev fallback is used otherwise)
    #[arg(long, env = "SECURE_STORE_KEY")]
    pub secure_store_key: Option<String>,

    /// Enable development mode (permits the insecure dev master key)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Request timeout in milliseconds for outbound HTTP calls
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Load configuration from the environment, reading `.env` if present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::parse_from(["wayrest"])
    }

    /// Get the effective secure-store master key.
    ///
    /// Uses an insecure fixed key in dev mode when none is configured.
    pub fn secure_store_key(&self) -> Result<[u8; 32], String> {
        match &self.secure_store_key {
            Some(encoded) => {
                let bytes = BASE64
                    .decode(encoded)
                    .map_err(|e| format!("SECURE_STORE_KEY is not valid base64: {e}"))?;
                bytes
                    .try_into()
                    .map_err(|_| "SECURE_STORE_KEY must decode to exactly 32 bytes".to_string())
            }
            None if self.dev_mode => Ok(*b"wayrest-dev-only-insecure-key-32"),
            None => Err("SECURE_STORE_KEY is required in production mode".to_string()),
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.secure_store_key()?;

        match self.auth_backend {
            BackendKind::Managed => {
                if self.identity_api_key.is_none() {
                    return Err("IDENTITY_API_KEY is required for the managed auth backend".into());
                }
            }
            BackendKind::Direct => {
                if self.database_url.is_none() {
                    return Err("DATABASE_URL is required for the direct auth backend".into());
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        let mut config = Config::parse_from(["wayrest"]);
        config.dev_mode = true;
        config.secure_store_key = None;
        config.identity_api_key = Some("test-key".into());
        config.database_url = None;
        config
    }

    #[test]
    fn test_dev_key_fallback() {
        let config = base_config();
        let key = config.secure_store_key().expect("dev key");
        assert_eq!(key.len(), 32);
    }

    #[test]
    fn test_production_requires_master_key() {
        let mut config = base_config();
        config.dev_mode = false;
        assert!(config.secure_store_key().is_err());
    }

    #[test]
    fn test_master_key_must_be_32_bytes() {
        let mut config = base_config();
        config.secure_store_key = Some(BASE64.encode(b"short"));
        assert!(config.secure_store_key().is_err());

        config.secure_store_key = Some(BASE64.encode([7u8; 32]));
        assert_eq!(config.secure_store_key().unwrap(), [7u8; 32]);
    }

    #[test]
    fn test_direct_backend_requires_database_url() {
        let mut config = base_config();
        config.auth_backend = BackendKind::Direct;
        assert!(config.validate().is_err());

        config.database_url = Some("postgres://localhost/wayrest".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_managed_backend_requires_identity_key() {
        let mut config = base_config();
        config.auth_backend = BackendKind::Managed;
        config.identity_api_key = None;
        assert!(config.validate().is_err());
    }
}
