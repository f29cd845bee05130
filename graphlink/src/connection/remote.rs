// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Remote client traits
//!
//! The wire protocol of the engine is out of scope; a driver adapter
//! implements these traits and reports failures as [`ExecutorError`]s,
//! classifying transient conditions as `TransientRemote`.
//!
//! [`ExecutorError`]: crate::error::ExecutorError

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;
use crate::query::Statement;
use crate::result::RawResult;

/// Cluster member a statement is routed to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    Read,
    #[default]
    Write,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    Read,
    #[default]
    Write,
}

/// Options forwarded to the driver when a session is opened
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub fetch_size: Option<usize>,
    pub access_mode: AccessMode,
    pub bookmarks: Vec<String>,
    pub impersonated_user: Option<String>,
}

/// A live client handle
#[async_trait]
pub trait GraphClient: Send + Sync {
    /// Open a remote session against `database`, or the server default
    async fn open_session(
        &self,
        database: Option<&str>,
        config: &SessionConfig,
    ) -> Result<Arc<dyn RemoteSession>>;

    /// Run one statement in an auto-commit transaction
    async fn execute(
        &self,
        statement: &Statement,
        database: Option<&str>,
        routing: RoutingMode,
    ) -> Result<RawResult>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
pub trait RemoteSession: Send + Sync {
    async fn begin_transaction(&self) -> Result<Box<dyn RemoteTransaction>>;

    async fn close(&self) -> Result<()>;
}

/// An open explicit transaction
///
/// After `commit` or `rollback` the transaction must not be used again.
#[async_trait]
pub trait RemoteTransaction: Send {
    async fn run(&mut self, statement: &Statement) -> Result<RawResult>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;
}
