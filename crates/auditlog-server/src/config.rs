// ABOUTME: Configuration loading and validation for the auditlog service.
// ABOUTME: Reads AUDITLOG_* environment variables and rejects values that do not parse.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("AUDITLOG_BIND is not a valid socket address: {0}")]
    InvalidBind(String),

    #[error("AUDITLOG_METRICS_BIND is not a valid socket address: {0}")]
    InvalidMetricsBind(String),

    #[error("AUDITLOG_BACKEND must be \"memory\" or \"dynamodb\", got {0:?}")]
    InvalidBackend(String),

    #[error("{name} must be a non-negative integer, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("AUDITLOG_TABLE must not be empty")]
    EmptyTable,
}

/// Which storage backend the process wires in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Memory,
    DynamoDb,
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "memorydb" => Ok(Backend::Memory),
            "dynamodb" | "dynamo" => Ok(Backend::DynamoDb),
            _ => Err(ConfigError::InvalidBackend(s.to_string())),
        }
    }
}

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AuditlogConfig {
    pub bind: SocketAddr,
    pub backend: Backend,
    pub table: String,
    pub dynamodb_endpoint: Option<String>,
    pub record_ttl: Duration,
    pub request_timeout: Duration,
    pub shutdown_grace: Duration,
    /// Where the Prometheus scrape endpoint listens. Unset disables export.
    pub metrics_bind: Option<SocketAddr>,
}

impl Default for AuditlogConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 7000)),
            backend: Backend::Memory,
            table: "events".to_string(),
            dynamodb_endpoint: None,
            record_ttl: Duration::from_secs(1440 * 60),
            request_timeout: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(10),
            metrics_bind: None,
        }
    }
}

impl AuditlogConfig {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Environment variables:
    /// - AUDITLOG_BIND: socket address to bind (default: 0.0.0.0:7000)
    /// - AUDITLOG_BACKEND: memory or dynamodb (default: memory)
    /// - AUDITLOG_TABLE: DynamoDB table name (default: events)
    /// - AUDITLOG_DYNAMODB_ENDPOINT: endpoint override, e.g. a local DynamoDB (optional)
    /// - AUDITLOG_RECORD_TTL_MINUTES: record lifetime, 0 disables expiry (default: 1440)
    /// - AUDITLOG_REQUEST_TIMEOUT_SECS: deadline for storage calls per request (default: 30)
    /// - AUDITLOG_SHUTDOWN_GRACE_SECS: time in-flight requests get on shutdown (default: 10)
    /// - AUDITLOG_METRICS_BIND: Prometheus scrape address (optional)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bind = match std::env::var("AUDITLOG_BIND") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidBind(raw))?,
            Err(_) => defaults.bind,
        };

        let backend = match std::env::var("AUDITLOG_BACKEND") {
            Ok(raw) if !raw.trim().is_empty() => raw.parse()?,
            _ => defaults.backend,
        };

        let table = match std::env::var("AUDITLOG_TABLE") {
            Ok(raw) if raw.trim().is_empty() => return Err(ConfigError::EmptyTable),
            Ok(raw) => raw.trim().to_string(),
            Err(_) => defaults.table,
        };

        let dynamodb_endpoint = std::env::var("AUDITLOG_DYNAMODB_ENDPOINT")
            .ok()
            .filter(|e| !e.is_empty());

        let record_ttl = env_number("AUDITLOG_RECORD_TTL_MINUTES")?
            .map(|minutes| Duration::from_secs(minutes.saturating_mul(60)))
            .unwrap_or(defaults.record_ttl);

        let request_timeout = env_number("AUDITLOG_REQUEST_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        let shutdown_grace = env_number("AUDITLOG_SHUTDOWN_GRACE_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.shutdown_grace);

        let metrics_bind = match std::env::var("AUDITLOG_METRICS_BIND") {
            Ok(raw) if raw.trim().is_empty() => None,
            Ok(raw) => Some(
                raw.trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidMetricsBind(raw))?,
            ),
            Err(_) => None,
        };

        Ok(Self {
            bind,
            backend,
            table,
            dynamodb_endpoint,
            record_ttl,
            request_timeout,
            shutdown_grace,
            metrics_bind,
        })
    }
}

fn env_number(name: &'static str) -> Result<Option<u64>, ConfigError> {
    match std::env::var(name) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { name, value: raw }),
        Err(_) => Ok(None),
    }
}
