//! Transaction manager and retry engine tests

#[path = "testutils/mod.rs"]
mod testutils;

use graphlink::error::TransientReason;
use graphlink::result::ResultSummary;
use graphlink::session::{SessionHandle, SessionManager, SessionManagerConfig};
use graphlink::txn::{
    CircuitBreaker, CircuitBreakerConfig, RetryPolicy, TransactionManager, TransactionStatus,
};
use graphlink::{
    BatchOptions, ExecutorError, InMemoryMetrics, ParameterBatch, ProtocolMode, Statement,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use testutils::{init_logging, result_with_rows, StubClient, StubState};
use tokio::time::Instant;

struct Harness {
    stub: StubClient,
    metrics: Arc<InMemoryMetrics>,
    sessions: Arc<SessionManager>,
    transactions: TransactionManager,
}

fn harness(policy: RetryPolicy) -> Harness {
    init_logging();
    let stub = StubClient::new();
    let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default()));
    let metrics = Arc::new(InMemoryMetrics::new());
    let sessions = Arc::new(SessionManager::new(
        stub.connection(),
        breaker.clone(),
        metrics.clone(),
        SessionManagerConfig::default(),
    ));
    let transactions = TransactionManager::new(sessions.clone(), breaker, policy, metrics.clone());
    Harness {
        stub,
        metrics,
        sessions,
        transactions,
    }
}

impl Harness {
    async fn session(&self) -> SessionHandle {
        self.sessions.get_session(None, None).await.unwrap()
    }
}

fn create(id: i64) -> Statement {
    Statement::from_statement("CREATE (n:Person {id: $id})", [("id", json!(id))])
}

fn unavailable() -> ExecutorError {
    ExecutorError::transient(TransientReason::ServiceUnavailable, "leader switched")
}

#[tokio::test(start_paused = true)]
async fn test_retries_transient_failures_then_commits() {
    let h = harness(RetryPolicy::default());
    let session = h.session().await;
    h.stub.state.script_run(Err(unavailable()));
    h.stub.state.script_run(Err(unavailable()));

    let started = Instant::now();
    let results = h
        .transactions
        .execute_in_transaction(&session, &[create(1)], None)
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    // backoff of 1s then 2s
    assert!(started.elapsed() >= Duration::from_secs(3));

    let state = h.sessions.session_state(session.id()).unwrap();
    assert_eq!(state.counters.transactions_rolled_back, 2);
    assert_eq!(state.counters.transactions_committed, 1);
    assert_eq!(state.counters.transactions_started, 3);
    assert_eq!(state.counters.queries_executed, 1);
    assert_eq!(state.errors.len(), 2);

    assert_eq!(StubState::count(&h.stub.state.rollbacks), 2);
    assert_eq!(StubState::count(&h.stub.state.commits), 1);
    assert_eq!(h.metrics.counter("query_retries_total"), 2.0);
    assert_eq!(h.metrics.observations("retry_delay_seconds"), vec![1.0, 2.0]);
    assert_eq!(h.transactions.transaction_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_error_propagates_unchanged() {
    let h = harness(RetryPolicy::default());
    let session = h.session().await;
    h.stub.state.script_run(Err(ExecutorError::remote(
        "Neo.ClientError.Schema.ConstraintValidationFailed",
        "already exists",
    )));

    let err = h
        .transactions
        .execute_in_transaction(&session, &[create(1)], None)
        .await
        .unwrap_err();
    match err {
        ExecutorError::Remote { code, .. } => {
            assert_eq!(code, "Neo.ClientError.Schema.ConstraintValidationFailed")
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(h.stub.state.executed().len(), 1);
    assert_eq!(StubState::count(&h.stub.state.commits), 0);
    let state = h.sessions.session_state(session.id()).unwrap();
    assert_eq!(state.counters.transactions_rolled_back, 1);
    assert_eq!(h.transactions.transaction_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_retries_exhausted_carries_last_error() {
    let policy = RetryPolicy {
        max_retries: 2,
        ..RetryPolicy::default()
    };
    let h = harness(policy);
    let session = h.session().await;
    for attempt in 0..3 {
        h.stub.state.script_run(Err(ExecutorError::transient(
            TransientReason::TransientServerError,
            format!("attempt {}", attempt),
        )));
    }

    let err = h
        .transactions
        .execute_in_transaction(&session, &[create(1)], None)
        .await
        .unwrap_err();
    match err {
        ExecutorError::RetriesExhausted { attempts, last, .. } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, ExecutorError::TransientRemote { .. }));
            assert!(last.to_string().contains("attempt 2"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(h.stub.state.executed().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_commit_failure_is_retried() {
    let h = harness(RetryPolicy::default());
    let session = h.session().await;
    h.stub.state.script_commit(Err(unavailable()));

    let results = h
        .transactions
        .execute_in_transaction(&session, &[create(1), create(2)], None)
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(h.stub.state.executed().len(), 4);
    assert_eq!(StubState::count(&h.stub.state.commits), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retryable_substring_override_is_per_call() {
    let h = harness(RetryPolicy::default());
    let session = h.session().await;
    let flaky = || ExecutorError::remote("Custom.Flaky", "lock wait");

    h.stub.state.script_run(Err(flaky()));
    let overrides = vec!["Custom.Flaky".to_string()];
    h.transactions
        .execute_in_transaction(&session, &[create(1)], Some(&overrides))
        .await
        .unwrap();

    // the override did not leak into the shared policy
    h.stub.state.script_run(Err(flaky()));
    let err = h
        .transactions
        .execute_in_transaction(&session, &[create(2)], None)
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::Remote { .. }));
    assert!(h.transactions.policy().retryable_error_substrings.len() == 1);
}

#[tokio::test]
async fn test_unknown_session_is_rejected() {
    let h = harness(RetryPolicy::default());
    let session = h.session().await;
    h.sessions.close_session(&session).await.unwrap();

    let err = h
        .transactions
        .execute_in_transaction(&session, &[create(1)], None)
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::UnknownSession(_)));
    assert!(h.stub.state.executed().is_empty());
}

#[tokio::test]
async fn test_results_follow_statement_order() {
    let h = harness(RetryPolicy::default());
    let session = h.session().await;
    let statements: Vec<Statement> = (0..5).map(create).collect();

    let results = h
        .transactions
        .execute_in_transaction(&session, &statements, None)
        .await
        .unwrap();

    let returned: Vec<Statement> = results.into_iter().map(|r| r.statement).collect();
    assert_eq!(returned, statements);
    assert_eq!(h.stub.state.executed(), statements);
}

#[tokio::test]
async fn test_malformed_batch_response_is_not_retried() {
    let h = harness(RetryPolicy::default());
    let session = h.session().await;
    h.stub.state.script_run(Ok(result_with_rows(
        vec![json!({"batches": 1, "total": 1})],
        ResultSummary::default(),
    )));
    let statement = ParameterBatch::new("MERGE (n:Person {id: params.id})", Vec::new())
        .to_statement(ProtocolMode::ServerIterated, &BatchOptions::default());

    let err = h
        .transactions
        .execute_in_transaction(&session, &[statement], None)
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::MalformedBatchResponse(_)));
    assert_eq!(StubState::count(&h.stub.state.rollbacks), 1);
    assert_eq!(StubState::count(&h.stub.state.commits), 0);
}

#[tokio::test]
async fn test_statistics_are_forwarded_to_metrics() {
    let h = harness(RetryPolicy::default());
    let session = h.session().await;
    let mut summary = ResultSummary {
        available_after: 30,
        consumed_after: 70,
        ..ResultSummary::default()
    };
    summary.counters.nodes_created = 1;
    h.stub.state.script_run(Ok(result_with_rows(Vec::<Value>::new(), summary)));

    let results = h
        .transactions
        .execute_in_transaction(&session, &[create(1)], None)
        .await
        .unwrap();
    assert_eq!(results[0].statistics.timing.total_time_ms, 100);
    assert_eq!(h.metrics.counter("query_total_time_ms"), 100.0);
    assert_eq!(h.metrics.counter("nodes_created_total"), 1.0);
    assert_eq!(h.metrics.counter("queries_executed_total"), 1.0);
    assert_eq!(h.metrics.counter("transaction_commits_total"), 1.0);
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_transactions_are_visible() {
    let h = Arc::new(harness(RetryPolicy::default()));
    let session = h.session().await;
    h.stub.state.script_run(Err(unavailable()));

    let task = {
        let h = h.clone();
        let session = session.clone();
        tokio::spawn(async move {
            h.transactions
                .execute_in_transaction(&session, &[create(1)], None)
                .await
                .map(|results| results.len())
        })
    };

    // let the first attempt fail and enter its backoff
    tokio::time::sleep(Duration::from_millis(500)).await;
    let active = h.transactions.active_transactions(session.id());
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].status, TransactionStatus::Failed);
    assert_eq!(active[0].retry_count, 0);
    assert!(active[0].last_retry_time.is_some());
    assert_eq!(active[0].error.as_deref().map(|e| e.contains("leader switched")), Some(true));
    assert!(h.transactions.clear_transaction(&active[0].id));
    assert_eq!(h.transactions.transaction_count(), 0);

    assert_eq!(task.await.unwrap().unwrap(), 1);
}

#[tokio::test]
async fn test_metrics_are_labelled_with_the_session_database() {
    let h = harness(RetryPolicy::default());
    let session = h.sessions.get_session(Some("ingest"), None).await.unwrap();
    h.stub.state.script_run(Err(ExecutorError::remote(
        "Neo.ClientError.Statement.SyntaxError",
        "bad input",
    )));

    let err = h
        .transactions
        .execute_in_transaction(&session, &[create(1)], None)
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::Remote { .. }));
    assert_eq!(
        h.metrics.counter_with(
            "transaction_rollbacks_total",
            &[("database", "ingest"), ("reason", "remote")]
        ),
        1.0
    );
    assert_eq!(
        h.metrics.counter_with(
            "query_errors_total",
            &[("database", "ingest"), ("error_type", "remote")]
        ),
        1.0
    );
    assert_eq!(h.transactions.transaction_count(), 0);

    h.transactions
        .execute_in_transaction(&session, &[create(2)], None)
        .await
        .unwrap();
    assert_eq!(
        h.metrics
            .counter_with("transaction_commits_total", &[("database", "ingest")]),
        1.0
    );
    assert_eq!(
        h.metrics
            .counter_with("transactions_started_total", &[("database", "ingest")]),
        2.0
    );
}
