// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query Executor - central entry point for statement execution
//!
//! The QueryExecutor wires the connection, session manager and transaction
//! manager together and exposes the operations an ingestion pipeline needs.

pub mod collaborators;
pub mod config;
pub mod executor;

pub use collaborators::{EntityOperation, ExpiryPolicy, IngestionHook, RelationshipOperation};
pub use config::ExecutorConfig;
pub use executor::{ExecuteOptions, ExecutorStats, QueryExecutor, StatusCounts};
