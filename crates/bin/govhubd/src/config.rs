//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `govhub.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::collections::HashMap;

use serde::Deserialize;

use govhub_app::realtime::RateLimitConfig;
use govhub_app::services::approval_service::ApprovalPolicy;
use govhub_domain::backup::RetentionPolicy;
use govhub_domain::id::UserId;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Real-time layer budgets and timeouts.
    pub realtime: RealtimeConfig,
    /// Which risk levels need a human decision.
    pub approval: ApprovalPolicy,
    /// Backup retention limits.
    pub backup: BackupConfig,
    /// Static auth tokens for real-time sessions.
    pub auth: AuthConfig,
    /// Platform gateway settings.
    pub platform: PlatformConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Real-time layer configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Messages one session may send per window.
    pub session_messages_per_window: u32,
    /// Messages one origin may send per window, across its sessions.
    pub origin_messages_per_window: u32,
    /// Rate-limit window length in seconds.
    pub window_secs: u64,
    /// Concurrent connections allowed per origin.
    pub max_connections_per_origin: u32,
    /// Bounded per-session send timeout for broker deliveries, in ms.
    pub send_timeout_ms: u64,
    /// Sessions idle longer than this are evicted, in seconds.
    pub heartbeat_timeout_secs: u64,
    /// Sweep interval of the heartbeat supervisor, in seconds.
    pub heartbeat_interval_secs: u64,
    /// Event bus broadcast capacity.
    pub event_bus_capacity: usize,
}

/// Backup retention configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Keep at most this many snapshots per automation.
    pub max_count: Option<usize>,
    /// Drop snapshots older than this many days.
    pub max_age_days: Option<u32>,
}

/// Static token table for session authentication.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// token -> user id (UUID).
    pub tokens: HashMap<String, String>,
}

/// Platform gateway configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Platform ids the virtual gateway should reject, for demos and
    /// failure-path rehearsals.
    pub fail_platform_ids: Vec<String>,
}

impl Config {
    /// Load configuration from `govhub.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if a
    /// value fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("govhub.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("GOVHUB_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("GOVHUB_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Ok(val) = std::env::var("GOVHUB_BIND") {
            if let Some((host, port)) = val.rsplit_once(':') {
                self.server.host = host.to_string();
                if let Ok(port) = port.parse() {
                    self.server.port = port;
                }
            }
        }
        if let Ok(val) = std::env::var("GOVHUB_DATABASE_URL") {
            self.database.url = val;
        }
        if let Ok(val) = std::env::var("GOVHUB_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.realtime.window_secs == 0 {
            return Err(ConfigError::Validation(
                "realtime.window_secs must be non-zero".to_string(),
            ));
        }
        for user in self.auth.tokens.values() {
            if user.parse::<UserId>().is_err() {
                return Err(ConfigError::Validation(format!(
                    "auth token user id is not a UUID: {user}"
                )));
            }
        }
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Rate limiter budgets.
    #[must_use]
    pub fn rate_limits(&self) -> RateLimitConfig {
        RateLimitConfig {
            session_messages_per_window: self.realtime.session_messages_per_window,
            origin_messages_per_window: self.realtime.origin_messages_per_window,
            window_secs: self.realtime.window_secs,
            max_connections_per_origin: self.realtime.max_connections_per_origin,
        }
    }

    /// Backup retention limits.
    #[must_use]
    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy {
            max_count: self.backup.max_count,
            max_age_days: self.backup.max_age_days,
        }
    }

    /// Parsed token table. Call after [`Self::load`] (which validates).
    #[must_use]
    pub fn auth_tokens(&self) -> HashMap<String, UserId> {
        self.auth
            .tokens
            .iter()
            .filter_map(|(token, user)| {
                user.parse::<UserId>().ok().map(|id| (token.clone(), id))
            })
            .collect()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:govhub.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "govhubd=info,govhub=info,tower_http=debug".to_string(),
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            session_messages_per_window: 100,
            origin_messages_per_window: 300,
            window_secs: 60,
            max_connections_per_origin: 5,
            send_timeout_ms: 500,
            heartbeat_timeout_secs: 300,
            heartbeat_interval_secs: 30,
            event_bus_capacity: 256,
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            max_count: Some(10),
            max_age_days: Some(90),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
