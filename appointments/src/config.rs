//! Configuration management for the appointment service.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Unparseable values fall back to the default; [`Config::validate`] catches
//! combinations that cannot work.

use booking_runtime::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration that cannot be used to start the service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required setting is absent
    #[error("missing configuration: {0}")]
    Missing(&'static str),

    /// A setting has a value that cannot work
    #[error("invalid configuration {key}: {reason}")]
    Invalid {
        /// Environment variable name
        key: &'static str,
        /// What is wrong
        reason: String,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Appointment storage configuration
    pub storage: StorageConfig,
    /// Base URLs of the external collaborators
    pub collaborators: CollaboratorsConfig,
    /// Per-dependency call deadlines
    pub timeouts: Timeouts,
    /// Notification delivery configuration
    pub notifications: NotificationConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Metrics server host (for Prometheus scraping)
    pub metrics_host: String,
    /// Metrics server port
    pub metrics_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
}

/// Where appointments are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process memory; lost on restart
    Memory,
    /// `PostgreSQL` via `DATABASE_URL`
    Postgres,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(ConfigError::Invalid {
                key: "STORAGE_BACKEND",
                reason: format!("unknown backend '{other}'"),
            }),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::Postgres => "postgres",
        })
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Selected backend
    pub backend: StorageBackend,
    /// `PostgreSQL` connection URL
    pub database_url: Option<String>,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout: u64,
    /// Apply migrations on startup
    pub run_migrations: bool,
}

/// Collaborator base URLs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaboratorsConfig {
    /// Identity service
    pub identity_url: String,
    /// Event registry
    pub event_registry_url: String,
    /// Notification service
    pub notification_url: String,
}

/// Upper bounds on each collaborator call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    /// Identity lookup
    pub identity: Duration,
    /// Event registry
    pub event_registry: Duration,
    /// Appointment store
    pub store: Duration,
    /// Whole notification delivery, retries included
    pub notification: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            identity: Duration::from_secs(2),
            event_registry: Duration::from_secs(2),
            store: Duration::from_secs(3),
            notification: Duration::from_secs(5),
        }
    }
}

impl Timeouts {
    /// The same deadline for every dependency
    #[must_use]
    pub const fn uniform(limit: Duration) -> Self {
        Self {
            identity: limit,
            event_registry: limit,
            store: limit,
            notification: limit,
        }
    }
}

/// Notification delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Retries after the first attempt for transient failures
    pub max_retries: usize,
    /// Delay before the first retry in milliseconds
    pub retry_delay_ms: u64,
}

impl NotificationConfig {
    /// Backoff policy for delivery retries
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(self.max_retries)
            .initial_delay(Duration::from_millis(self.retry_delay_ms))
            .build()
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn millis(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: Duration) -> Duration {
    lookup(key)
        .and_then(|s| s.trim().parse().ok())
        .map_or(default, Duration::from_millis)
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key/value source.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Timeouts::default();

        Self {
            server: ServerConfig {
                host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parsed(&lookup, "PORT", 8080),
                metrics_host: lookup("METRICS_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                metrics_port: parsed(&lookup, "METRICS_PORT", 9090),
                shutdown_timeout: parsed(&lookup, "SHUTDOWN_TIMEOUT", 30),
            },
            storage: StorageConfig {
                backend: parsed(&lookup, "STORAGE_BACKEND", StorageBackend::Memory),
                database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
                max_connections: parsed(&lookup, "DATABASE_MAX_CONNECTIONS", 10),
                connect_timeout: parsed(&lookup, "DATABASE_CONNECT_TIMEOUT", 5),
                run_migrations: parsed(&lookup, "DATABASE_RUN_MIGRATIONS", true),
            },
            collaborators: CollaboratorsConfig {
                identity_url: lookup("IDENTITY_SERVICE_URL")
                    .unwrap_or_else(|| "http://localhost:8081".to_string()),
                event_registry_url: lookup("EVENT_REGISTRY_URL")
                    .unwrap_or_else(|| "http://localhost:8082".to_string()),
                notification_url: lookup("NOTIFICATION_SERVICE_URL")
                    .unwrap_or_else(|| "http://localhost:8083".to_string()),
            },
            timeouts: Timeouts {
                identity: millis(&lookup, "IDENTITY_TIMEOUT_MS", defaults.identity),
                event_registry: millis(&lookup, "EVENT_REGISTRY_TIMEOUT_MS", defaults.event_registry),
                store: millis(&lookup, "STORE_TIMEOUT_MS", defaults.store),
                notification: millis(&lookup, "NOTIFICATION_TIMEOUT_MS", defaults.notification),
            },
            notifications: NotificationConfig {
                max_retries: parsed(&lookup, "NOTIFICATION_MAX_RETRIES", 2),
                retry_delay_ms: parsed(&lookup, "NOTIFICATION_RETRY_DELAY_MS", 200),
            },
        }
    }

    /// Reject settings the service cannot start with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for zero timeouts, a zero-sized pool, or the
    /// postgres backend without `DATABASE_URL`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("IDENTITY_TIMEOUT_MS", self.timeouts.identity),
            ("EVENT_REGISTRY_TIMEOUT_MS", self.timeouts.event_registry),
            ("STORE_TIMEOUT_MS", self.timeouts.store),
            ("NOTIFICATION_TIMEOUT_MS", self.timeouts.notification),
        ] {
            if value.is_zero() {
                return Err(ConfigError::Invalid {
                    key,
                    reason: "timeout must be greater than zero".to_string(),
                });
            }
        }

        if self.storage.backend == StorageBackend::Postgres {
            if self.storage.database_url.is_none() {
                return Err(ConfigError::Missing("DATABASE_URL"));
            }
            if self.storage.max_connections == 0 {
                return Err(ConfigError::Invalid {
                    key: "DATABASE_MAX_CONNECTIONS",
                    reason: "pool needs at least one connection".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Socket address string for the HTTP server
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.timeouts, Timeouts::default());
        assert_eq!(config.notifications.max_retries, 2);
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_reads_overrides_and_ignores_garbage() {
        let config = config(&[
            ("PORT", "9000"),
            ("STORE_TIMEOUT_MS", "750"),
            ("IDENTITY_TIMEOUT_MS", "soon"),
            ("STORAGE_BACKEND", "PostgreSQL"),
            ("DATABASE_URL", "postgres://localhost/appointments"),
        ]);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.timeouts.store, Duration::from_millis(750));
        assert_eq!(config.timeouts.identity, Duration::from_secs(2));
        assert_eq!(config.storage.backend, StorageBackend::Postgres);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_postgres_requires_url() {
        let config = config(&[("STORAGE_BACKEND", "postgres")]);
        assert_eq!(config.validate(), Err(ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let config = config(&[("NOTIFICATION_TIMEOUT_MS", "0")]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                key: "NOTIFICATION_TIMEOUT_MS",
                ..
            })
        ));
    }

    #[test]
    fn test_retry_policy_uses_configured_delay() {
        let policy = config(&[("NOTIFICATION_RETRY_DELAY_MS", "50"), ("NOTIFICATION_MAX_RETRIES", "4")])
            .notifications
            .retry_policy();
        assert_eq!(policy.max_retries, 4);
        assert_eq!(policy.initial_delay, Duration::from_millis(50));
    }
}
