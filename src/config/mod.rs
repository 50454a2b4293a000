//! Configuration loading for the tenancy engine.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `TENANCY_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application configuration derived from `TENANCY_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_acquire_timeout_ms")]
    pub db_acquire_timeout_ms: u64,
    /// Connection attempts before startup gives up (default: 5).
    #[serde(default = "default_db_connect_max_retries")]
    pub db_connect_max_retries: u32,
    /// Initial backoff between connection attempts; doubles per retry
    /// (default: 100ms).
    #[serde(default = "default_db_connect_retry_delay_ms")]
    pub db_connect_retry_delay_ms: u64,
    /// Prefix prepended to every derived tenant schema name.
    #[serde(default = "default_schema_prefix")]
    pub schema_prefix: String,
    #[serde(default)]
    pub pool: PoolConfig,
}

/// Per-schema client pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct PoolConfig {
    /// Ceiling on concurrently cached clients (default: 50).
    #[serde(default = "default_pool_max_clients")]
    pub max_clients: usize,
    /// Entries idle longer than this are reaped (default: 300s).
    #[serde(default = "default_pool_idle_timeout_seconds")]
    pub idle_timeout_seconds: u64,
    /// How often the idle reaper wakes up (default: 60s).
    #[serde(default = "default_pool_reap_interval_seconds")]
    pub reap_interval_seconds: u64,
    /// When set, a full pool rejects new schemas with `POOL_EXHAUSTED`
    /// instead of evicting the least-recently-used entry (default: off).
    #[serde(default)]
    pub reject_when_full: bool,
}

fn default_profile() -> String {
    "dev".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_database_url() -> String {
    "postgres://localhost:5432/tenancy".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_acquire_timeout_ms() -> u64 {
    5_000
}

fn default_db_connect_max_retries() -> u32 {
    5
}

fn default_db_connect_retry_delay_ms() -> u64 {
    100
}

fn default_schema_prefix() -> String {
    crate::slug::DEFAULT_SCHEMA_PREFIX.to_string()
}

fn default_pool_max_clients() -> usize {
    50
}

fn default_pool_idle_timeout_seconds() -> u64 {
    300
}

fn default_pool_reap_interval_seconds() -> u64 {
    60
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            database_url: default_database_url(),
            db_max_connections: default_db_max_connections(),
            db_acquire_timeout_ms: default_db_acquire_timeout_ms(),
            db_connect_max_retries: default_db_connect_max_retries(),
            db_connect_retry_delay_ms: default_db_connect_retry_delay_ms(),
            schema_prefix: default_schema_prefix(),
            pool: PoolConfig::default(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_clients: default_pool_max_clients(),
            idle_timeout_seconds: default_pool_idle_timeout_seconds(),
            reap_interval_seconds: default_pool_reap_interval_seconds(),
            reject_when_full: false,
        }
    }
}

impl AppConfig {
    /// Validate configuration bounds before the engine starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.is_empty() {
            return Err(ConfigError::MissingDatabaseUrl);
        }
        if self.db_connect_max_retries == 0 {
            return Err(ConfigError::InvalidDbConnectRetries {
                value: self.db_connect_max_retries,
            });
        }
        self.pool.validate()
    }
}

impl PoolConfig {
    /// Validate pool configuration bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_clients == 0 {
            return Err(ConfigError::InvalidPoolMaxClients {
                value: self.max_clients,
            });
        }

        if self.idle_timeout_seconds == 0 {
            return Err(ConfigError::InvalidPoolIdleTimeout {
                value: self.idle_timeout_seconds,
            });
        }

        if self.reap_interval_seconds == 0 || self.reap_interval_seconds > 3_600 {
            return Err(ConfigError::InvalidPoolReapInterval {
                value: self.reap_interval_seconds,
            });
        }

        Ok(())
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("database URL is missing; set TENANCY_DATABASE_URL")]
    MissingDatabaseUrl,
    #[error("database connect retries must be at least 1, got {value}")]
    InvalidDbConnectRetries { value: u32 },
    #[error("pool max clients must be at least 1, got {value}")]
    InvalidPoolMaxClients { value: usize },
    #[error("pool idle timeout must be at least 1 second, got {value}")]
    InvalidPoolIdleTimeout { value: u64 },
    #[error("pool reap interval must be between 1 and 3600 seconds, got {value}")]
    InvalidPoolReapInterval { value: u64 },
}

/// Loads configuration using layered `.env` files and `TENANCY_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads configuration, layering `.env` < `.env.local` <
    /// `.env.<profile>` < `.env.<profile>.local` < process environment.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix("TENANCY_") {
                layered.insert(stripped.to_string(), value);
            }
        }

        let profile = layered
            .remove("PROFILE")
            .filter(|v| !v.is_empty())
            .unwrap_or(profile_hint);
        let log_level = layered
            .remove("LOG_LEVEL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_log_level);
        let log_format = layered
            .remove("LOG_FORMAT")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_log_format);
        let database_url = layered
            .remove("DATABASE_URL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_database_url);
        let db_max_connections = layered
            .remove("DB_MAX_CONNECTIONS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_db_max_connections);
        let db_acquire_timeout_ms = layered
            .remove("DB_ACQUIRE_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_db_acquire_timeout_ms);
        let db_connect_max_retries = layered
            .remove("DB_CONNECT_MAX_RETRIES")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_db_connect_max_retries);
        let db_connect_retry_delay_ms = layered
            .remove("DB_CONNECT_RETRY_DELAY_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_db_connect_retry_delay_ms);
        let schema_prefix = layered
            .remove("SCHEMA_PREFIX")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_schema_prefix);

        let pool = PoolConfig {
            max_clients: layered
                .remove("POOL_MAX_CLIENTS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_pool_max_clients),
            idle_timeout_seconds: layered
                .remove("POOL_IDLE_TIMEOUT_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_pool_idle_timeout_seconds),
            reap_interval_seconds: layered
                .remove("POOL_REAP_INTERVAL_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_pool_reap_interval_seconds),
            reject_when_full: layered
                .remove("POOL_REJECT_WHEN_FULL")
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        };

        let config = AppConfig {
            profile,
            log_level,
            log_format,
            database_url,
            db_max_connections,
            db_acquire_timeout_ms,
            db_connect_max_retries,
            db_connect_retry_delay_ms,
            schema_prefix,
            pool,
        };

        config.validate()?;
        Ok(config)
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var("TENANCY_PROFILE")
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix("TENANCY_") {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pool.max_clients, 50);
        assert_eq!(config.schema_prefix, "tenant_");
        assert!(!config.pool.reject_when_full);
        assert_eq!(config.db_connect_max_retries, 5);
        assert_eq!(config.db_connect_retry_delay_ms, 100);
    }

    #[test]
    fn zero_connect_retries_is_rejected() {
        let mut config = AppConfig::default();
        config.db_connect_max_retries = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDbConnectRetries { value: 0 })
        ));
    }

    #[test]
    fn connect_retry_policy_is_loaded_from_env_files() {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::write(
            dir.path().join(".env"),
            "TENANCY_DB_CONNECT_MAX_RETRIES=3\nTENANCY_DB_CONNECT_RETRY_DELAY_MS=250\n",
        )
        .expect("write .env");

        let loader = ConfigLoader::with_base_dir(dir.path().to_path_buf());
        let config = loader.load().expect("load config");

        assert_eq!(config.db_connect_max_retries, 3);
        assert_eq!(config.db_connect_retry_delay_ms, 250);
    }

    #[test]
    fn pool_bounds_are_enforced() {
        let mut config = AppConfig::default();
        config.pool.max_clients = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPoolMaxClients { value: 0 })
        ));

        let mut config = AppConfig::default();
        config.pool.reap_interval_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.pool.idle_timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_database_url_is_rejected() {
        let mut config = AppConfig::default();
        config.database_url = String::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingDatabaseUrl)
        ));
    }

    #[test]
    fn layered_env_files_are_merged_in_order() {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::write(
            dir.path().join(".env"),
            "TENANCY_POOL_MAX_CLIENTS=10\nTENANCY_SCHEMA_PREFIX=org_\n",
        )
        .expect("write .env");
        fs::write(
            dir.path().join(".env.local"),
            "TENANCY_POOL_MAX_CLIENTS=20\n",
        )
        .expect("write .env.local");

        let loader = ConfigLoader::with_base_dir(dir.path().to_path_buf());
        let config = loader.load().expect("load config");

        assert_eq!(config.pool.max_clients, 20);
        assert_eq!(config.schema_prefix, "org_");
    }

    #[test]
    fn profile_specific_file_overrides_base() {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::write(
            dir.path().join(".env"),
            "TENANCY_PROFILE=test\nTENANCY_POOL_IDLE_TIMEOUT_SECONDS=120\n",
        )
        .expect("write .env");
        fs::write(
            dir.path().join(".env.test"),
            "TENANCY_POOL_IDLE_TIMEOUT_SECONDS=30\n",
        )
        .expect("write .env.test");

        let loader = ConfigLoader::with_base_dir(dir.path().to_path_buf());
        let config = loader.load().expect("load config");

        assert_eq!(config.profile, "test");
        assert_eq!(config.pool.idle_timeout_seconds, 30);
    }

    #[test]
    fn missing_env_files_are_fine() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let loader = ConfigLoader::with_base_dir(dir.path().to_path_buf());
        let config = loader.load().expect("load config");
        assert_eq!(config.pool.max_clients, 50);
    }
}
