// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! GraphLink - execution layer for remote graph databases
//!
//! GraphLink sits between an ingestion pipeline and a remote graph engine. It
//! manages connections, sessions and transactions, renders bulk parameter sets
//! into server-iterated or client-unwound statements, retries transient
//! failures behind a per-operation circuit breaker, and reports fine-grained
//! statistics to an injected metrics sink.
//!
//! # Features
//!
//! - **Session lifecycle**: capacity-bounded session table with idle reaping
//! - **Transactions with retry**: exponential/linear/constant backoff
//! - **Circuit breaking**: keyed failure windows with a half-open probe
//! - **Batched mutations**: server-side bulk iteration or client-side unwinding
//! - **Statistics**: normalized write counters and timings per statement
//!
//! # Usage
//!
//! The [`QueryExecutor`] is the entry point. It is constructed from an
//! [`ExecutorConfig`], a [`Connection`] wrapping a client factory, and a
//! [`MetricsSink`].

// Public modules - exposed to external users
pub mod connection;
pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod query;
pub mod result;
pub mod session;
pub mod txn;

// Re-export the public API
pub use connection::{Connection, GraphClient, RemoteSession, RemoteTransaction, RoutingMode};
pub use coordinator::{ExecutorConfig, ExecutorStats, QueryExecutor};
pub use error::{ErrorKind, ExecutorError, Result, TransientReason};
pub use metrics::{InMemoryMetrics, MetricsSink, MonitoringConfig, NoopMetrics};
pub use query::{BatchOptions, ParameterBatch, ProtocolMode, Statement};
pub use result::{QueryResult, QueryStatistics, RawResult};

/// GraphLink version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
