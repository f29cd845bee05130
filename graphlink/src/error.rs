// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Executor error types
//!
//! Every fallible operation in the crate returns [`ExecutorError`]. Retry
//! decisions are made on its [`ErrorKind`], never on the rendered message,
//! except for the configurable substring overrides in the retry policy.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, ExecutorError>;

/// Transient failure families reported by the remote engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransientReason {
    ServiceUnavailable,
    SessionExpired,
    TransientServerError,
    TokenExpired,
}

impl fmt::Display for TransientReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransientReason::ServiceUnavailable => "service unavailable",
            TransientReason::SessionExpired => "session expired",
            TransientReason::TransientServerError => "transient server error",
            TransientReason::TokenExpired => "auth token expired",
        };
        f.write_str(name)
    }
}

/// Execution errors
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Connection failure: {0}")]
    ConnectionFailure(String),

    #[error("Transient remote error ({reason}): {message}")]
    TransientRemote {
        reason: TransientReason,
        message: String,
    },

    #[error("Remote error {code}: {message}")]
    Remote { code: String, message: String },

    #[error("Unknown session: {0}")]
    UnknownSession(String),

    #[error("Resource exhausted: {active} active sessions, limit {max}")]
    ResourceExhausted { active: usize, max: usize },

    #[error("Circuit breaker open for {0}")]
    CircuitOpen(String),

    #[error("Transaction {transaction} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        transaction: String,
        attempts: u32,
        #[source]
        last: Box<ExecutorError>,
    },

    #[error("Malformed batch response: {0}")]
    MalformedBatchResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Coarse classification of [`ExecutorError`] used by retry policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ConnectionFailure,
    TransientRemote,
    Remote,
    UnknownSession,
    ResourceExhausted,
    CircuitOpen,
    RetriesExhausted,
    MalformedBatchResponse,
    Configuration,
}

impl ErrorKind {
    /// Stable label used when the kind is attached to a metric
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConnectionFailure => "connection_failure",
            ErrorKind::TransientRemote => "transient_remote",
            ErrorKind::Remote => "remote",
            ErrorKind::UnknownSession => "unknown_session",
            ErrorKind::ResourceExhausted => "resource_exhausted",
            ErrorKind::CircuitOpen => "circuit_open",
            ErrorKind::RetriesExhausted => "retries_exhausted",
            ErrorKind::MalformedBatchResponse => "malformed_batch_response",
            ErrorKind::Configuration => "configuration",
        }
    }
}

impl ExecutorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecutorError::ConnectionFailure(_) => ErrorKind::ConnectionFailure,
            ExecutorError::TransientRemote { .. } => ErrorKind::TransientRemote,
            ExecutorError::Remote { .. } => ErrorKind::Remote,
            ExecutorError::UnknownSession(_) => ErrorKind::UnknownSession,
            ExecutorError::ResourceExhausted { .. } => ErrorKind::ResourceExhausted,
            ExecutorError::CircuitOpen(_) => ErrorKind::CircuitOpen,
            ExecutorError::RetriesExhausted { .. } => ErrorKind::RetriesExhausted,
            ExecutorError::MalformedBatchResponse(_) => ErrorKind::MalformedBatchResponse,
            ExecutorError::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// Shorthand for a transient remote error
    pub fn transient(reason: TransientReason, message: impl Into<String>) -> Self {
        ExecutorError::TransientRemote {
            reason,
            message: message.into(),
        }
    }

    /// Shorthand for a non-transient remote error carrying a server code
    pub fn remote(code: impl Into<String>, message: impl Into<String>) -> Self {
        ExecutorError::Remote {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Whether a reconnect may help
    pub fn is_connection_related(&self) -> bool {
        matches!(
            self,
            ExecutorError::ConnectionFailure(_) | ExecutorError::TransientRemote { .. }
        )
    }
}

impl From<serde_json::Error> for ExecutorError {
    fn from(error: serde_json::Error) -> Self {
        ExecutorError::Configuration(error.to_string())
    }
}

impl From<std::io::Error> for ExecutorError {
    fn from(error: std::io::Error) -> Self {
        ExecutorError::Configuration(error.to_string())
    }
}
