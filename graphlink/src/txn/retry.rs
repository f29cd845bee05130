// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Retry policy and backoff

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::coordinator::config::duration_secs;
use crate::error::{ErrorKind, ExecutorError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategy {
    #[default]
    Exponential,
    Linear,
    Constant,
}

/// When and how long to wait before retrying a failed transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub strategy: RetryStrategy,
    pub max_retries: u32,
    #[serde(with = "duration_secs")]
    pub initial_delay: Duration,
    #[serde(with = "duration_secs")]
    pub max_delay: Duration,
    pub retryable_error_kinds: HashSet<ErrorKind>,
    /// An error whose message contains any of these is retryable
    pub retryable_error_substrings: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            strategy: RetryStrategy::Exponential,
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            retryable_error_kinds: [ErrorKind::TransientRemote].into_iter().collect(),
            retryable_error_substrings: vec![
                "Neo.TransientError.Transaction.Terminated".to_string(),
            ],
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (zero-based), clamped to `max_delay`
    pub fn delay(&self, retry: u32) -> Duration {
        let initial = self.initial_delay.as_secs_f64();
        let secs = match self.strategy {
            RetryStrategy::Exponential => initial * 2f64.powi(retry.min(i32::MAX as u32) as i32),
            RetryStrategy::Linear => initial * (f64::from(retry) + 1.0),
            RetryStrategy::Constant => initial,
        };
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }

    /// Whether `error` is worth retrying
    ///
    /// `substrings` replaces the configured substrings when given.
    pub fn is_retryable(&self, error: &ExecutorError, substrings: Option<&[String]>) -> bool {
        if self.retryable_error_kinds.contains(&error.kind()) {
            return true;
        }
        let substrings = substrings.unwrap_or(&self.retryable_error_substrings);
        if substrings.is_empty() {
            return false;
        }
        let message = error.to_string();
        substrings.iter().any(|s| message.contains(s.as_str()))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.initial_delay > self.max_delay {
            return Err(format!(
                "initial_delay {:?} exceeds max_delay {:?}",
                self.initial_delay, self.max_delay
            ));
        }
        Ok(())
    }
}
