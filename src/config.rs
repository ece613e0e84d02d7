//! Server configuration module
//!
//! Handles loading and parsing of server configuration from files and
//! environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Server name displayed to players
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Address to bind the listener to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// TCP port for player connections
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum number of concurrent connections
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,

    /// Idle timeout in seconds before a connection is reaped
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Interval in seconds between reaper sweeps
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Development mode flag (in-memory stores, no database)
    #[serde(default)]
    pub dev_mode: bool,

    /// Enable debug logging
    #[serde(default)]
    pub debug: bool,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Full connection URL; overrides the individual fields when set
    #[serde(default)]
    pub url: Option<String>,

    /// Database host
    #[serde(default = "default_db_host")]
    pub host: String,

    /// Database port
    #[serde(default = "default_db_port")]
    pub port: u16,

    /// Database name
    #[serde(default = "default_db_name")]
    pub database: String,

    /// Database username
    #[serde(default = "default_db_user")]
    pub username: String,

    /// Database password
    #[serde(default)]
    pub password: String,

    /// Maximum connection pool size
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

// Default value functions
fn default_server_name() -> String {
    "IronMUD".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4000
}

fn default_max_clients() -> usize {
    100
}

fn default_idle_timeout() -> u64 {
    1800 // 30 minutes
}

fn default_cleanup_interval() -> u64 {
    30
}

fn default_db_host() -> String {
    "localhost".to_string()
}

fn default_db_port() -> u16 {
    5432
}

fn default_db_name() -> String {
    "ironmud".to_string()
}

fn default_db_user() -> String {
    "ironmud".to_string()
}

fn default_pool_size() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: default_db_host(),
            port: default_db_port(),
            database: default_db_name(),
            username: default_db_user(),
            password: String::new(),
            pool_size: default_pool_size(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("config/server.toml"),
            server_name: default_server_name(),
            bind_address: default_bind_address(),
            port: default_port(),
            max_clients: default_max_clients(),
            idle_timeout_secs: default_idle_timeout(),
            cleanup_interval_secs: default_cleanup_interval(),
            database: DatabaseConfig::default(),
            dev_mode: false,
            debug: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from file and environment variables
    pub async fn load() -> Result<Self> {
        // Determine config path from environment or use default
        let config_path = env::var("IRONMUD_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/server.toml"));

        // Try to load from file
        let mut config = if config_path.exists() {
            let content = tokio::fs::read_to_string(&config_path)
                .await
                .with_context(|| {
                    format!("Failed to read config file: {}", config_path.display())
                })?;

            toml::from_str(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?
        } else {
            tracing::warn!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            Self::default()
        };

        config.config_path = config_path;

        // Override with environment variables
        config.apply_env_overrides();

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("IRONMUD_SERVER_NAME") {
            self.server_name = val;
        }
        if let Ok(val) = env::var("IRONMUD_BIND_ADDRESS") {
            self.bind_address = val;
        }
        if let Ok(val) = env::var("IRONMUD_PORT") {
            if let Ok(port) = val.parse() {
                self.port = port;
            }
        }
        if let Ok(val) = env::var("IRONMUD_MAX_CLIENTS") {
            if let Ok(max) = val.parse() {
                self.max_clients = max;
            }
        }
        if let Ok(val) = env::var("IRONMUD_IDLE_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                self.idle_timeout_secs = secs;
            }
        }
        if let Ok(val) = env::var("IRONMUD_CLEANUP_INTERVAL_SECS") {
            if let Ok(secs) = val.parse() {
                self.cleanup_interval_secs = secs;
            }
        }
        if let Ok(val) = env::var("IRONMUD_DEV_MODE") {
            self.dev_mode = val.to_lowercase() == "true" || val == "1";
        }
        if let Ok(val) = env::var("IRONMUD_DEBUG") {
            self.debug = val.to_lowercase() == "true" || val == "1";
        }

        // Database overrides (IRONMUD_DATABASE_URL takes precedence over DATABASE_URL)
        if let Ok(val) = env::var("DATABASE_URL") {
            self.database.url = Some(val);
        }
        if let Ok(val) = env::var("IRONMUD_DATABASE_URL") {
            self.database.url = Some(val);
        }
        if let Ok(val) = env::var("IRONMUD_DATABASE_HOST") {
            self.database.host = val;
        }
        if let Ok(val) = env::var("IRONMUD_DATABASE_PORT") {
            if let Ok(port) = val.parse() {
                self.database.port = port;
            }
        }
        if let Ok(val) = env::var("IRONMUD_DATABASE_NAME") {
            self.database.database = val;
        }
        if let Ok(val) = env::var("IRONMUD_DATABASE_USER") {
            self.database.username = val;
        }
        if let Ok(val) = env::var("IRONMUD_DATABASE_PASSWORD") {
            self.database.password = val;
        }
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("Port must be non-zero");
        }

        if self.max_clients == 0 || self.max_clients > 10000 {
            anyhow::bail!("Max clients must be between 1 and 10000");
        }

        if self.cleanup_interval_secs == 0 {
            anyhow::bail!("Cleanup interval must be at least 1 second");
        }

        if self.idle_timeout_secs == 0 {
            anyhow::bail!("Idle timeout must be at least 1 second");
        }

        Ok(())
    }

    /// Get the address the listener binds to
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Idle timeout as a [`Duration`]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Reaper interval as a [`Duration`]
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    /// Get the database connection URL
    pub fn database_url(&self) -> String {
        if let Some(url) = &self.database.url {
            return url.clone();
        }
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.database.username,
            self.database.password,
            self.database.host,
            self.database.port,
            self.database.database
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.server_name, "IronMUD");
        assert_eq!(config.port, 4000);
        assert_eq!(config.max_clients, 100);
        assert_eq!(config.idle_timeout_secs, 1800);
        assert_eq!(config.cleanup_interval_secs, 30);
        assert!(!config.dev_mode);
    }

    #[test]
    fn test_listen_addr() {
        let mut config = ServerConfig::default();
        config.bind_address = "127.0.0.1".to_string();
        config.port = 4444;
        assert_eq!(config.listen_addr(), "127.0.0.1:4444");
    }

    #[test]
    fn test_validation() {
        let mut config = ServerConfig::default();

        // Valid config should pass
        assert!(config.validate().is_ok());

        // Invalid port
        config.port = 0;
        assert!(config.validate().is_err());
        config.port = 4000;

        // Invalid max clients
        config.max_clients = 0;
        assert!(config.validate().is_err());
        config.max_clients = 100;

        // Invalid cleanup interval
        config.cleanup_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_database_url() {
        let mut config = ServerConfig::default();
        config.database.username = "mud".to_string();
        config.database.password = "secret".to_string();
        config.database.host = "db".to_string();
        assert_eq!(
            config.database_url(),
            "postgres://mud:secret@db:5432/ironmud"
        );

        config.database.url = Some("postgres://elsewhere/mud".to_string());
        assert_eq!(config.database_url(), "postgres://elsewhere/mud");
    }
}
