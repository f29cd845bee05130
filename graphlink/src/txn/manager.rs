// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Transaction manager implementation
//!
//! One call to [`TransactionManager::execute_in_transaction`] drives one
//! logical transaction through as many remote attempts as the retry policy
//! allows. The transaction table only holds transactions that are in flight;
//! an entry is cleared when its call returns, on every path.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::connection::RemoteTransaction;
use crate::error::{ExecutorError, Result};
use crate::metrics::definitions as metric;
use crate::metrics::MetricsSink;
use crate::query::Statement;
use crate::result::QueryResult;
use crate::session::{SessionCounter, SessionHandle, SessionId, SessionManager};

use super::circuit_breaker::CircuitBreaker;
use super::retry::RetryPolicy;
use super::state::{TransactionId, TransactionState, TransactionStatus};

/// Transaction manager handles the lifecycle of all transactions
pub struct TransactionManager {
    sessions: Arc<SessionManager>,
    breaker: Arc<CircuitBreaker>,
    policy: RetryPolicy,
    metrics: Arc<dyn MetricsSink>,
    /// In-flight transactions by ID
    active_transactions: Mutex<HashMap<TransactionId, TransactionState>>,
}

/// Clears a transaction entry when the owning call returns
struct ActiveEntry<'a> {
    manager: &'a TransactionManager,
    id: TransactionId,
}

impl Drop for ActiveEntry<'_> {
    fn drop(&mut self) {
        self.manager.clear_transaction(&self.id);
        self.manager.breaker.forget(&self.id.breaker_key());
    }
}

impl TransactionManager {
    pub fn new(
        sessions: Arc<SessionManager>,
        breaker: Arc<CircuitBreaker>,
        policy: RetryPolicy,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            sessions,
            breaker,
            policy,
            metrics,
            active_transactions: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `statements` in order inside one transaction, retrying on
    /// retryable failures
    ///
    /// `retryable_substrings` replaces the policy's substrings for this call
    /// only. Results are returned in input order.
    pub async fn execute_in_transaction(
        &self,
        session: &SessionHandle,
        statements: &[Statement],
        retryable_substrings: Option<&[String]>,
    ) -> Result<Vec<QueryResult>> {
        if !self.sessions.is_tracked(session.id()) {
            return Err(ExecutorError::UnknownSession(session.id().to_string()));
        }

        let state = TransactionState::new(session.id().clone(), statements.to_vec());
        let id = state.id.clone();
        let breaker_key = id.breaker_key();
        self.register(state);
        let _entry = ActiveEntry {
            manager: self,
            id: id.clone(),
        };

        let mut retries = 0u32;
        loop {
            if !self.breaker.can_execute(&breaker_key) {
                log::warn!("Circuit open for transaction {}", id);
                return Err(ExecutorError::CircuitOpen(breaker_key));
            }

            let error = match self.attempt(session, statements).await {
                Ok(results) => {
                    self.update(&id, |state| state.commit());
                    self.breaker.record_success(&breaker_key);
                    self.bump(session, SessionCounter::TransactionsCommitted);
                    self.metrics.increment(
                        metric::TRANSACTION_COMMITS.name,
                        1.0,
                        &[("database", session.database_label())],
                    );
                    log::debug!(
                        "Transaction {} committed {} statement(s) after {} retries",
                        id,
                        statements.len(),
                        retries
                    );
                    return Ok(results);
                }
                Err(error) => error,
            };

            let kind = error.kind().as_str();
            let database = session.database_label();
            self.update(&id, |state| state.fail(error.to_string(), retries));
            self.bump(session, SessionCounter::TransactionsRolledBack);
            self.sessions.record_error(session, &error);
            self.metrics.increment(
                metric::TRANSACTION_ROLLBACKS.name,
                1.0,
                &[("reason", kind), ("database", database)],
            );

            if !self.policy.is_retryable(&error, retryable_substrings) {
                self.breaker.record_failure(&breaker_key);
                self.metrics.increment(
                    metric::QUERY_ERRORS.name,
                    1.0,
                    &[("error_type", kind), ("database", database)],
                );
                log::error!("Transaction {} failed: {}", id, error);
                return Err(error);
            }

            if retries >= self.policy.max_retries {
                self.breaker.record_failure(&breaker_key);
                self.metrics.increment(
                    metric::QUERY_ERRORS.name,
                    1.0,
                    &[("error_type", kind), ("database", database)],
                );
                log::error!(
                    "Transaction {} exhausted {} retries: {}",
                    id,
                    self.policy.max_retries,
                    error
                );
                return Err(ExecutorError::RetriesExhausted {
                    transaction: id.to_string(),
                    attempts: retries + 1,
                    last: Box::new(error),
                });
            }

            let delay = self.policy.delay(retries);
            log::warn!(
                "Transaction {} attempt {} failed, retrying in {:?}: {}",
                id,
                retries + 1,
                delay,
                error
            );
            let labels = [("error_type", kind), ("database", database)];
            self.metrics
                .increment(metric::QUERY_RETRIES.name, 1.0, &labels);
            self.metrics
                .observe(metric::RETRY_DELAY_SECONDS.name, delay.as_secs_f64(), &labels);
            tokio::time::sleep(delay).await;

            retries += 1;
            self.update(&id, |state| {
                state.retry_count = retries;
                state.restart();
            });
        }
    }

    async fn attempt(
        &self,
        session: &SessionHandle,
        statements: &[Statement],
    ) -> Result<Vec<QueryResult>> {
        let mut tx = session.remote().begin_transaction().await?;
        self.bump(session, SessionCounter::TransactionsStarted);
        self.metrics.increment(
            metric::TRANSACTIONS_STARTED.name,
            1.0,
            &[("database", session.database_label())],
        );

        let mut results = Vec::with_capacity(statements.len());
        for statement in statements {
            match self.run_statement(tx.as_mut(), session, statement).await {
                Ok(result) => results.push(result),
                Err(e) => {
                    rollback_quietly(tx.as_mut()).await;
                    return Err(e);
                }
            }
        }

        if let Err(e) = tx.commit().await {
            rollback_quietly(tx.as_mut()).await;
            return Err(e);
        }
        Ok(results)
    }

    async fn run_statement(
        &self,
        tx: &mut dyn RemoteTransaction,
        session: &SessionHandle,
        statement: &Statement,
    ) -> Result<QueryResult> {
        let raw = tx.run(statement).await?;
        let result = QueryResult::from_raw(statement.clone(), raw)?;
        let labels = [("database", session.database_label())];
        result.statistics.record(self.metrics.as_ref(), &labels);
        self.metrics
            .increment(metric::QUERIES_EXECUTED.name, 1.0, &labels);
        self.bump(session, SessionCounter::QueriesExecuted);
        Ok(result)
    }

    fn bump(&self, session: &SessionHandle, counter: SessionCounter) {
        if let Err(e) = self.sessions.update_session_metrics(session, counter, 1) {
            log::warn!("Could not update {:?} for {}: {}", counter, session.id(), e);
        }
    }

    fn register(&self, state: TransactionState) {
        let active = {
            let mut transactions = self.active_transactions.lock();
            transactions.insert(state.id.clone(), state);
            transactions.len()
        };
        self.metrics
            .set(metric::TRANSACTIONS_ACTIVE.name, active as f64, &[]);
    }

    fn update(&self, id: &TransactionId, f: impl FnOnce(&mut TransactionState)) {
        if let Some(state) = self.active_transactions.lock().get_mut(id) {
            f(state);
        }
    }

    /// Forget a transaction; returns whether it was tracked
    pub fn clear_transaction(&self, id: &TransactionId) -> bool {
        let (removed, active) = {
            let mut transactions = self.active_transactions.lock();
            let removed = transactions.remove(id).is_some();
            (removed, transactions.len())
        };
        if removed {
            self.metrics
                .set(metric::TRANSACTIONS_ACTIVE.name, active as f64, &[]);
        }
        removed
    }

    /// Unfinished transactions of `session`
    pub fn active_transactions(&self, session: &SessionId) -> Vec<TransactionState> {
        self.active_transactions
            .lock()
            .values()
            .filter(|state| &state.session_id == session)
            .filter(|state| {
                matches!(
                    state.status,
                    TransactionStatus::Started | TransactionStatus::Failed
                )
            })
            .cloned()
            .collect()
    }

    pub fn transaction_state(&self, id: &TransactionId) -> Option<TransactionState> {
        self.active_transactions.lock().get(id).cloned()
    }

    pub fn transaction_count(&self) -> usize {
        self.active_transactions.lock().len()
    }

    pub fn status_counts(&self) -> BTreeMap<TransactionStatus, usize> {
        let transactions = self.active_transactions.lock();
        let mut counts = BTreeMap::new();
        for state in transactions.values() {
            *counts.entry(state.status).or_insert(0) += 1;
        }
        counts
    }
}

async fn rollback_quietly(tx: &mut dyn RemoteTransaction) {
    if let Err(e) = tx.rollback().await {
        log::warn!("Rollback failed: {}", e);
    }
}
