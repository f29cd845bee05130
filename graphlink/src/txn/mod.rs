// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Transaction management module
//!
//! This module provides transaction execution with retry, backoff and
//! per-operation circuit breaking.

pub mod circuit_breaker;
pub mod manager;
pub mod retry;
pub mod state;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use manager::TransactionManager;
pub use retry::{RetryPolicy, RetryStrategy};
pub use state::{TransactionId, TransactionState, TransactionStatus};
