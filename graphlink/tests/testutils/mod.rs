//! Test utilities for GraphLink integration tests
//!
//! `StubClient` implements the remote client traits in memory. Outcomes are
//! scripted per call type; once a script runs dry every call succeeds with
//! the default result.

#![allow(dead_code)]

use async_trait::async_trait;
use graphlink::connection::{
    GraphClient, RemoteSession, RemoteTransaction, RoutingMode, SessionConfig,
};
use graphlink::error::Result;
use graphlink::result::{RawResult, Record, ResultSummary};
use graphlink::{Connection, ExecutorConfig, InMemoryMetrics, QueryExecutor, Statement};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Default)]
pub struct StubState {
    pub open_script: Mutex<VecDeque<Result<()>>>,
    pub begin_script: Mutex<VecDeque<Result<()>>>,
    pub run_script: Mutex<VecDeque<Result<RawResult>>>,
    pub commit_script: Mutex<VecDeque<Result<()>>>,
    pub close_script: Mutex<VecDeque<Result<()>>>,
    pub execute_script: Mutex<VecDeque<Result<RawResult>>>,
    pub default_result: Mutex<RawResult>,
    /// Time every session open takes before it resolves
    pub open_delay: Mutex<Option<Duration>>,

    /// Statements run inside transactions, in order
    pub executed: Mutex<Vec<Statement>>,
    /// Statements run through auto-commit execution
    pub auto_committed: Mutex<Vec<Statement>>,
    pub databases: Mutex<Vec<Option<String>>>,

    pub sessions_opened: AtomicUsize,
    pub sessions_closed: AtomicUsize,
    pub commits: AtomicUsize,
    pub rollbacks: AtomicUsize,
    pub clients_created: AtomicUsize,
    pub clients_closed: AtomicUsize,
}

impl StubState {
    pub fn script_open(&self, outcome: Result<()>) {
        self.open_script.lock().push_back(outcome);
    }

    pub fn script_run(&self, outcome: Result<RawResult>) {
        self.run_script.lock().push_back(outcome);
    }

    pub fn script_commit(&self, outcome: Result<()>) {
        self.commit_script.lock().push_back(outcome);
    }

    pub fn script_close(&self, outcome: Result<()>) {
        self.close_script.lock().push_back(outcome);
    }

    pub fn script_execute(&self, outcome: Result<RawResult>) {
        self.execute_script.lock().push_back(outcome);
    }

    pub fn set_open_delay(&self, delay: Option<Duration>) {
        *self.open_delay.lock() = delay;
    }

    pub fn set_default_result(&self, result: RawResult) {
        *self.default_result.lock() = result;
    }

    pub fn executed(&self) -> Vec<Statement> {
        self.executed.lock().clone()
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn next_run(&self) -> Result<RawResult> {
        let scripted = self.run_script.lock().pop_front();
        scripted.unwrap_or_else(|| Ok(self.default_result.lock().clone()))
    }
}

/// In-memory client whose behaviour is scripted through its shared state
#[derive(Clone, Default)]
pub struct StubClient {
    pub state: Arc<StubState>,
}

impl StubClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// A connection whose factory hands out clients sharing this stub's state
    pub fn connection(&self) -> Arc<Connection> {
        Arc::new(self.connection_builder())
    }

    pub fn connection_builder(&self) -> Connection {
        let state = self.state.clone();
        Connection::from_fn(move || {
            state.clients_created.fetch_add(1, Ordering::SeqCst);
            let client: Arc<dyn GraphClient> = Arc::new(StubClient {
                state: state.clone(),
            });
            Ok(client)
        })
        .with_reconnect(2, Duration::from_millis(10))
    }
}

#[async_trait]
impl GraphClient for StubClient {
    async fn open_session(
        &self,
        database: Option<&str>,
        _config: &SessionConfig,
    ) -> Result<Arc<dyn RemoteSession>> {
        let delay = *self.state.open_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.state.open_script.lock().pop_front();
        scripted.unwrap_or(Ok(()))?;
        self.state.sessions_opened.fetch_add(1, Ordering::SeqCst);
        self.state
            .databases
            .lock()
            .push(database.map(str::to_string));
        Ok(Arc::new(StubSession {
            state: self.state.clone(),
        }))
    }

    async fn execute(
        &self,
        statement: &Statement,
        _database: Option<&str>,
        _routing: RoutingMode,
    ) -> Result<RawResult> {
        self.state.auto_committed.lock().push(statement.clone());
        let scripted = self.state.execute_script.lock().pop_front();
        scripted.unwrap_or_else(|| Ok(self.state.default_result.lock().clone()))
    }

    async fn close(&self) -> Result<()> {
        self.state.clients_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct StubSession {
    state: Arc<StubState>,
}

#[async_trait]
impl RemoteSession for StubSession {
    async fn begin_transaction(&self) -> Result<Box<dyn RemoteTransaction>> {
        let scripted = self.state.begin_script.lock().pop_front();
        scripted.unwrap_or(Ok(()))?;
        Ok(Box::new(StubTransaction {
            state: self.state.clone(),
        }))
    }

    async fn close(&self) -> Result<()> {
        let scripted = self.state.close_script.lock().pop_front();
        self.state.sessions_closed.fetch_add(1, Ordering::SeqCst);
        scripted.unwrap_or(Ok(()))
    }
}

pub struct StubTransaction {
    state: Arc<StubState>,
}

#[async_trait]
impl RemoteTransaction for StubTransaction {
    async fn run(&mut self, statement: &Statement) -> Result<RawResult> {
        self.state.executed.lock().push(statement.clone());
        self.state.next_run()
    }

    async fn commit(&mut self) -> Result<()> {
        let scripted = self.state.commit_script.lock().pop_front();
        let outcome = scripted.unwrap_or(Ok(()));
        if outcome.is_ok() {
            self.state.commits.fetch_add(1, Ordering::SeqCst);
        }
        outcome
    }

    async fn rollback(&mut self) -> Result<()> {
        self.state.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn record(value: Value) -> Record {
    value.as_object().cloned().expect("record must be a JSON object")
}

pub fn result_with_rows(rows: Vec<Value>, summary: ResultSummary) -> RawResult {
    RawResult::new(rows.into_iter().map(record).collect(), summary)
}

/// Configuration with short delays for tests
pub fn test_config() -> ExecutorConfig {
    let mut config = ExecutorConfig::default();
    config.retry.initial_delay = Duration::from_millis(10);
    config.retry.max_delay = Duration::from_millis(100);
    config
}

pub fn executor(
    config: ExecutorConfig,
    stub: &StubClient,
) -> (QueryExecutor, Arc<InMemoryMetrics>) {
    init_logging();
    let metrics = Arc::new(InMemoryMetrics::new());
    let executor = QueryExecutor::new(config, stub.connection(), metrics.clone())
        .expect("test configuration must be valid");
    (executor, metrics)
}
