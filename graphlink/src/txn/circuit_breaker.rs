// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Keyed circuit breaker
//!
//! Each key has its own failure window. A key opens once `failure_threshold`
//! failures fall within `reset_timeout`; `half_open_timeout` after its last
//! failure it lets exactly one trial call through, whose outcome closes or
//! reopens it. A trial that reports no outcome within `half_open_timeout` is
//! considered abandoned and another one is admitted.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

use crate::coordinator::config::duration_secs;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: usize,
    #[serde(with = "duration_secs")]
    pub reset_timeout: Duration,
    #[serde(with = "duration_secs")]
    pub half_open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),     // 1 minute
            half_open_timeout: Duration::from_secs(30), // 30 seconds
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct Circuit {
    failures: VecDeque<Instant>,
    state: CircuitState,
    /// When the current half-open trial was admitted
    trial_admitted_at: Option<Instant>,
}

impl Circuit {
    fn new() -> Self {
        Self {
            failures: VecDeque::new(),
            state: CircuitState::Closed,
            trial_admitted_at: None,
        }
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    circuits: Mutex<HashMap<String, Circuit>>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            circuits: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn record_failure(&self, key: &str) {
        let now = Instant::now();
        let mut circuits = self.circuits.lock();
        let circuit = circuits.entry(key.to_string()).or_insert_with(Circuit::new);

        circuit.failures.push_back(now);
        while let Some(oldest) = circuit.failures.front() {
            if now.duration_since(*oldest) >= self.config.reset_timeout {
                circuit.failures.pop_front();
            } else {
                break;
            }
        }

        let was_trial = circuit.state == CircuitState::HalfOpen;
        if was_trial || circuit.failures.len() >= self.config.failure_threshold {
            if circuit.state != CircuitState::Open {
                log::warn!(
                    "Circuit '{}' opened after {} failure(s)",
                    key,
                    circuit.failures.len()
                );
            }
            circuit.state = CircuitState::Open;
            circuit.trial_admitted_at = None;
        }
    }

    pub fn record_success(&self, key: &str) {
        let mut circuits = self.circuits.lock();
        if let Some(circuit) = circuits.get_mut(key) {
            if circuit.state != CircuitState::Closed {
                log::info!("Circuit '{}' closed", key);
            }
            circuit.failures.clear();
            circuit.state = CircuitState::Closed;
            circuit.trial_admitted_at = None;
        }
    }

    /// Whether a call for `key` may proceed
    pub fn can_execute(&self, key: &str) -> bool {
        let mut circuits = self.circuits.lock();
        let Some(circuit) = circuits.get_mut(key) else {
            return true;
        };

        match circuit.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let cooled_down = circuit
                    .failures
                    .back()
                    .map(|last| last.elapsed() >= self.config.half_open_timeout)
                    .unwrap_or(true);
                if cooled_down {
                    log::info!("Circuit '{}' half-open, allowing one trial call", key);
                    circuit.state = CircuitState::HalfOpen;
                    circuit.trial_admitted_at = Some(Instant::now());
                }
                cooled_down
            }
            CircuitState::HalfOpen => {
                let abandoned = circuit
                    .trial_admitted_at
                    .map(|admitted| admitted.elapsed() >= self.config.half_open_timeout)
                    .unwrap_or(true);
                if abandoned {
                    log::warn!("Circuit '{}' trial reported no outcome, allowing another", key);
                    circuit.trial_admitted_at = Some(Instant::now());
                }
                abandoned
            }
        }
    }

    pub fn state(&self, key: &str) -> CircuitState {
        self.circuits
            .lock()
            .get(key)
            .map(|c| c.state)
            .unwrap_or(CircuitState::Closed)
    }

    /// Failures currently inside the window for `key`
    pub fn failure_count(&self, key: &str) -> usize {
        self.circuits
            .lock()
            .get(key)
            .map(|c| c.failures.len())
            .unwrap_or(0)
    }

    /// Drop all bookkeeping for `key`
    pub fn forget(&self, key: &str) {
        self.circuits.lock().remove(key);
    }
}
