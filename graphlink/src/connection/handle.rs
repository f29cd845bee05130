// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Client handle ownership
//!
//! The handle is created lazily from a factory and replaced wholesale when a
//! failure suggests it is stale. Callers never see a half-replaced handle.

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::metrics::definitions::CONNECTION_RECREATED;
use crate::metrics::{MetricsSink, NoopMetrics};
use crate::query::Statement;
use crate::result::Record;

use super::remote::{GraphClient, RoutingMode};

/// Produces a fresh client handle
pub type ClientFactory = Arc<dyn Fn() -> Result<Arc<dyn GraphClient>> + Send + Sync>;

pub struct Connection {
    factory: ClientFactory,
    client: RwLock<Option<Arc<dyn GraphClient>>>,
    database: Option<String>,
    max_reconnect_attempts: u32,
    reconnect_delay: Duration,
    metrics: Arc<dyn MetricsSink>,
}

impl Connection {
    pub fn new(factory: ClientFactory) -> Self {
        Self {
            factory,
            client: RwLock::new(None),
            database: None,
            max_reconnect_attempts: 2,
            reconnect_delay: Duration::from_millis(100), // 100ms
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Wrap a closure as the client factory
    pub fn from_fn<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn GraphClient>> + Send + Sync + 'static,
    {
        Self::new(Arc::new(factory))
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Attempts made by [`Connection::execute`], reconnecting in between
    pub fn with_reconnect(mut self, max_attempts: u32, delay: Duration) -> Self {
        self.max_reconnect_attempts = max_attempts.max(1);
        self.reconnect_delay = delay;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    /// Return the current handle, creating it on first use
    pub fn acquire(&self) -> Result<Arc<dyn GraphClient>> {
        if let Some(client) = self.client.read().as_ref() {
            return Ok(client.clone());
        }

        let mut slot = self.client.write();
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }
        let client = (self.factory)()?;
        *slot = Some(client.clone());
        Ok(client)
    }

    /// Replace the current handle with a fresh one from the factory
    pub fn recreate(&self) -> Result<Arc<dyn GraphClient>> {
        let client = (self.factory)()?;
        *self.client.write() = Some(client.clone());
        self.metrics.increment(CONNECTION_RECREATED.name, 1.0, &[]);
        log::info!("Recreated graph client handle");
        Ok(client)
    }

    /// Run a statement outside any managed session
    ///
    /// Connection-related failures recreate the handle and retry, up to the
    /// configured number of attempts. The last error is returned unchanged.
    pub async fn execute(
        &self,
        statement: &Statement,
        routing: RoutingMode,
        log_result: bool,
    ) -> Result<Vec<Record>> {
        log::info!("Executing statement: {}", statement.text());

        let mut attempt = 1;
        let mut client = self.acquire()?;
        loop {
            match client.execute(statement, self.database(), routing).await {
                Ok(result) => {
                    if log_result {
                        for record in &result.records {
                            log::info!("Gathered statement result: {:?}", record);
                        }
                    }
                    return Ok(result.records);
                }
                Err(e) if e.is_connection_related() && attempt < self.max_reconnect_attempts => {
                    log::warn!(
                        "Statement failed on attempt {}/{}: {}; reconnecting",
                        attempt,
                        self.max_reconnect_attempts,
                        e
                    );
                    tokio::time::sleep(self.reconnect_delay).await;
                    client = self.recreate()?;
                    attempt += 1;
                }
                Err(e) => {
                    log::error!("Statement failed after {} attempt(s): {}", attempt, e);
                    return Err(e);
                }
            }
        }
    }

    /// Close the current handle, if any
    pub async fn close(&self) -> Result<()> {
        let client = self.client.write().take();
        match client {
            Some(client) => client.close().await,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("database", &self.database)
            .field("connected", &self.client.read().is_some())
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .finish()
    }
}
