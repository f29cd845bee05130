// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Executor configuration
//!
//! Every field has a default, so a configuration file only needs to name the
//! values it changes. Durations are written as (fractional) seconds.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ExecutorError, Result};
use crate::metrics::MonitoringConfig;
use crate::query::{BatchOptions, ProtocolMode};
use crate::session::SessionManagerConfig;
use crate::txn::{CircuitBreakerConfig, RetryPolicy};

/// Global executor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Database used when an operation does not name one
    pub database: Option<String>,

    /// Items per chunk, both client-side and server-side
    pub chunk_size: usize,

    /// Let the server run bulk-iteration chunks in parallel
    pub execute_chunks_in_parallel: bool,

    /// Server-side retries per bulk-iteration chunk
    pub retries_per_chunk: u32,

    /// How parameter batches are shipped
    pub protocol_mode: ProtocolMode,

    /// Session capacity and idle reaping
    #[serde(flatten)]
    pub sessions: SessionManagerConfig,

    /// Transaction retry policy
    pub retry: RetryPolicy,

    pub circuit_breaker: CircuitBreakerConfig,

    pub monitoring: MonitoringConfig,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            database: None,
            chunk_size: 1000,
            execute_chunks_in_parallel: true,
            retries_per_chunk: 3,
            protocol_mode: ProtocolMode::ServerIterated,
            sessions: SessionManagerConfig::default(),
            retry: RetryPolicy::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl ExecutorConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ExecutorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ExecutorError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ExecutorError::Configuration(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        if self.sessions.max_sessions == 0 {
            return Err(ExecutorError::Configuration(
                "max_sessions must be at least 1".to_string(),
            ));
        }
        if self.sessions.cleanup_interval.is_zero() {
            return Err(ExecutorError::Configuration(
                "cleanup_interval must be positive".to_string(),
            ));
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ExecutorError::Configuration(
                "failure_threshold must be at least 1".to_string(),
            ));
        }
        self.retry.validate().map_err(ExecutorError::Configuration)
    }

    /// Server-side chunking options for parameter batches
    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            batch_size: self.chunk_size,
            parallel: self.execute_chunks_in_parallel,
            max_retries: self.retries_per_chunk,
        }
    }
}

/// `Duration` as fractional seconds
pub(crate) mod duration_secs {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs)
            .map_err(|e| D::Error::custom(format!("invalid duration {}: {}", secs, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_defaults() {
        let config = ExecutorConfig::default();
        assert_eq!(config.chunk_size, 1000);
        assert!(config.execute_chunks_in_parallel);
        assert_eq!(config.retries_per_chunk, 3);
        assert_eq!(config.sessions.max_sessions, 100);
        assert_eq!(config.sessions.session_timeout, Duration::from_secs(300));
        assert_eq!(config.sessions.cleanup_interval, Duration::from_secs(60));
        assert_eq!(config.protocol_mode, ProtocolMode::ServerIterated);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ExecutorConfig::from_json_str(
            r#"{
                "chunk_size": 250,
                "protocol_mode": "client_unwound",
                "max_sessions": 4,
                "session_timeout": 1.5,
                "retry": {"strategy": "linear", "max_retries": 5}
            }"#,
        )
        .unwrap();

        assert_eq!(config.chunk_size, 250);
        assert_eq!(config.protocol_mode, ProtocolMode::ClientUnwound);
        assert_eq!(config.sessions.max_sessions, 4);
        assert_eq!(config.sessions.session_timeout, Duration::from_millis(1500));
        assert_eq!(config.sessions.cleanup_interval, Duration::from_secs(60));
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.initial_delay, Duration::from_secs(1));
        assert_eq!(config.circuit_breaker.failure_threshold, 5);

        let options = config.batch_options();
        assert_eq!(options.batch_size, 250);
        assert_eq!(options.max_retries, 3);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            ExecutorConfig::from_json_str(r#"{"chunk_size": 0}"#),
            Err(ExecutorError::Configuration(_))
        ));
        assert!(matches!(
            ExecutorConfig::from_json_str(r#"{"session_timeout": -1}"#),
            Err(ExecutorError::Configuration(_))
        ));
        assert!(matches!(
            ExecutorConfig::from_json_str(r#"{"retry": {"initial_delay": 90}}"#),
            Err(ExecutorError::Configuration(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"database": "ingest", "execute_chunks_in_parallel": false}}"#).unwrap();

        let config = ExecutorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.database.as_deref(), Some("ingest"));
        assert!(!config.execute_chunks_in_parallel);

        let missing = ExecutorConfig::from_file("/nonexistent/graphlink.json");
        assert!(matches!(missing, Err(ExecutorError::Configuration(_))));
    }

    #[test]
    fn test_round_trip_through_json() {
        let config = ExecutorConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(ExecutorConfig::from_json_str(&json).unwrap(), config);
    }
}
