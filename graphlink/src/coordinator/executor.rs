// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query executor
//!
//! Every operation acquires its own session, runs inside one managed
//! transaction and releases the session before returning, whatever the
//! outcome. A failure to release is logged and never replaces the
//! operation's own result.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::time::Instant;

use crate::connection::{Connection, SessionConfig};
use crate::error::{ExecutorError, Result};
use crate::metrics::definitions as metric;
use crate::metrics::{FilteredSink, MetricsSink};
use crate::query::{ParameterBatch, Parameters, Statement};
use crate::result::QueryResult;
use crate::session::models::database_label;
use crate::session::{SessionManager, SessionStatus};
use crate::txn::{CircuitBreaker, TransactionManager, TransactionStatus};

use super::collaborators::{EntityOperation, ExpiryPolicy, IngestionHook, RelationshipOperation};
use super::config::ExecutorConfig;

/// Per-call overrides
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Overrides the configured database
    pub database: Option<String>,
    pub session_config: Option<SessionConfig>,
    /// Replaces the retry policy's retryable substrings for this call
    pub retryable_substrings: Option<Vec<String>>,
}

impl ExecuteOptions {
    pub fn database(database: impl Into<String>) -> Self {
        Self {
            database: Some(database.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCounts<S: Ord> {
    pub active: usize,
    pub by_status: BTreeMap<S, usize>,
}

/// Point-in-time view of tracked sessions and transactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutorStats {
    pub sessions: StatusCounts<SessionStatus>,
    pub transactions: StatusCounts<TransactionStatus>,
}

/// Public entry point for executing statements
pub struct QueryExecutor {
    config: ExecutorConfig,
    connection: Arc<Connection>,
    sessions: Arc<SessionManager>,
    transactions: TransactionManager,
    metrics: Arc<dyn MetricsSink>,
}

impl QueryExecutor {
    /// Create an executor
    ///
    /// `metrics` only receives the families enabled in the configuration's
    /// monitoring section. Must be called from within a tokio runtime for the
    /// idle session reaper to start.
    pub fn new(
        config: ExecutorConfig,
        connection: Arc<Connection>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self> {
        config.validate()?;

        let metrics: Arc<dyn MetricsSink> =
            Arc::new(FilteredSink::new(metrics, config.monitoring.clone()));
        let breaker = Arc::new(CircuitBreaker::new(config.circuit_breaker.clone()));
        let sessions = Arc::new(SessionManager::new(
            connection.clone(),
            breaker.clone(),
            metrics.clone(),
            config.sessions.clone(),
        ));
        let transactions = TransactionManager::new(
            sessions.clone(),
            breaker,
            config.retry.clone(),
            metrics.clone(),
        );

        log::info!(
            "Query executor ready (protocol {:?}, chunk size {}, max sessions {})",
            config.protocol_mode,
            config.chunk_size,
            config.sessions.max_sessions
        );

        Ok(Self {
            config,
            connection,
            sessions,
            transactions,
            metrics,
        })
    }

    /// Create an executor from a JSON configuration file
    pub fn from_config_file(
        path: impl AsRef<Path>,
        connection: Arc<Connection>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self> {
        let config = ExecutorConfig::from_file(path)?;
        Self::new(config, connection, metrics)
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn transactions(&self) -> &TransactionManager {
        &self.transactions
    }

    /// Run one statement given as text and parameters
    pub async fn execute_statement(
        &self,
        text: &str,
        parameters: Parameters,
        options: &ExecuteOptions,
    ) -> Result<QueryResult> {
        self.execute_query(Statement::new(text, parameters), options)
            .await
    }

    /// Run one statement
    pub async fn execute_query(
        &self,
        statement: Statement,
        options: &ExecuteOptions,
    ) -> Result<QueryResult> {
        let mut results = self
            .run_in_session("query", std::slice::from_ref(&statement), options)
            .await?;
        results.pop().ok_or_else(|| {
            ExecutorError::remote(
                "Client.NoResult",
                format!("no result returned for: {}", statement.text()),
            )
        })
    }

    /// Run `text` once per chunk of `items`, each chunk bound as `$batch`
    ///
    /// Chunks run strictly in order; the first failure aborts the rest.
    pub async fn execute_batch(
        &self,
        text: &str,
        items: &[Value],
        batch_size: Option<usize>,
        options: &ExecuteOptions,
    ) -> Result<Vec<QueryResult>> {
        let batch_size = batch_size.unwrap_or(self.config.chunk_size);
        if batch_size == 0 {
            return Err(ExecutorError::Configuration(
                "batch_size must be at least 1".to_string(),
            ));
        }

        let chunks = items.len().div_ceil(batch_size);
        let mut results = Vec::with_capacity(chunks);
        for (index, chunk) in items.chunks(batch_size).enumerate() {
            let mut parameters = Parameters::new();
            parameters.insert("batch".to_string(), Value::Array(chunk.to_vec()));
            match self.execute_statement(text, parameters, options).await {
                Ok(result) => results.push(result),
                Err(e) => {
                    log::error!("Batch chunk {}/{} failed: {}", index + 1, chunks, e);
                    return Err(e);
                }
            }
        }
        log::debug!("Executed {} item(s) in {} chunk(s)", items.len(), chunks);
        Ok(results)
    }

    /// Run several statements in one transaction
    pub async fn execute_transaction(
        &self,
        statements: &[Statement],
        options: &ExecuteOptions,
    ) -> Result<Vec<QueryResult>> {
        self.run_in_session("transaction", statements, options)
            .await
    }

    /// Render a parameter batch with the configured protocol and run it
    pub async fn execute_parameter_batch(&self, batch: &ParameterBatch) -> Result<QueryResult> {
        let statement = batch.to_statement(self.config.protocol_mode, &self.config.batch_options());
        let result = self
            .execute_query(statement, &ExecuteOptions::default())
            .await?;

        if let Some(stats) = &result.statistics.batch {
            if stats.failed_operations > 0 || stats.was_terminated {
                log::warn!(
                    "Bulk iteration of {} item(s): {} committed, {} failed, terminated: {}, \
                     errors: {:?}",
                    batch.len(),
                    stats.committed_operations,
                    stats.failed_operations,
                    stats.was_terminated,
                    stats.error_messages
                );
            } else {
                log::info!(
                    "Bulk iteration of {} item(s): {} committed in {} batch(es)",
                    batch.len(),
                    stats.committed_operations,
                    stats.batches
                );
            }
        }
        Ok(result)
    }

    pub async fn upsert_entities_bulk<O>(
        &self,
        operation: &O,
        entities: &[O::Entity],
    ) -> Result<QueryResult>
    where
        O: EntityOperation + ?Sized,
    {
        let parameter_sets = entities
            .iter()
            .map(|entity| operation.entity_parameters(entity))
            .collect();
        let batch = ParameterBatch::new(operation.template(), parameter_sets);
        self.execute_parameter_batch(&batch).await
    }

    pub async fn upsert_relationships_bulk<O>(
        &self,
        operation: &O,
        relationships: &[O::Relationship],
    ) -> Result<QueryResult>
    where
        O: RelationshipOperation + ?Sized,
    {
        let parameter_sets = relationships
            .iter()
            .map(|relationship| operation.relationship_parameters(relationship))
            .collect();
        let batch = ParameterBatch::new(operation.template(), parameter_sets);
        self.execute_parameter_batch(&batch).await
    }

    pub async fn run_expiry_policy<P>(&self, policy: &P) -> Result<QueryResult>
    where
        P: ExpiryPolicy + ?Sized,
    {
        let statement = policy.expiry_statement(self.config.retries_per_chunk);
        self.execute_query(statement, &ExecuteOptions::default())
            .await
    }

    pub async fn run_hook<H>(&self, hook: &H) -> Result<QueryResult>
    where
        H: IngestionHook + ?Sized,
    {
        self.execute_query(hook.statement(), &ExecuteOptions::default())
            .await
    }

    pub fn stats(&self) -> ExecutorStats {
        ExecutorStats {
            sessions: StatusCounts {
                active: self.sessions.session_count(),
                by_status: self.sessions.status_counts(),
            },
            transactions: StatusCounts {
                active: self.transactions.transaction_count(),
                by_status: self.transactions.status_counts(),
            },
        }
    }

    /// Close every session and the client handle
    ///
    /// Cleanup runs to completion; the first failure is returned afterwards.
    pub async fn close(&self) -> Result<()> {
        let mut failures = self.sessions.close_all_sessions().await;
        let connection_result = self.connection.close().await;
        if let Err(e) = &connection_result {
            log::error!("Failed to close graph client: {}", e);
        }

        if !failures.is_empty() {
            let (_, first) = failures.swap_remove(0);
            return Err(first);
        }
        connection_result
    }

    async fn run_in_session(
        &self,
        operation: &'static str,
        statements: &[Statement],
        options: &ExecuteOptions,
    ) -> Result<Vec<QueryResult>> {
        let started = Instant::now();
        let database = options
            .database
            .as_deref()
            .or(self.config.database.as_deref());

        let outcome = match self
            .sessions
            .get_session(database, options.session_config.as_ref())
            .await
        {
            Ok(session) => {
                let outcome = self
                    .transactions
                    .execute_in_transaction(
                        &session,
                        statements,
                        options.retryable_substrings.as_deref(),
                    )
                    .await;
                if let Err(e) = self.sessions.mark_idle(&session) {
                    log::debug!("Session {} already gone: {}", session.id(), e);
                }
                if let Err(e) = self.sessions.close_session(&session).await {
                    log::error!("Failed to release session {}: {}", session.id(), e);
                }
                outcome
            }
            Err(e) => Err(e),
        };

        let labels = [("operation", operation), ("database", database_label(database))];
        self.metrics.observe(
            metric::QUERY_EXECUTION_TIME_SECONDS.name,
            started.elapsed().as_secs_f64(),
            &labels,
        );
        if let Err(e) = &outcome {
            self.metrics
                .increment(metric::FAILED_QUERIES.name, 1.0, &labels);
            log::error!("{} failed: {}", operation, e);
        }
        outcome
    }
}
