// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Catalogue of every metric the executor emits
//!
//! Series tied to a session carry a `database` label; unnamed databases are
//! reported as `default`. Gauges are process-wide and unlabelled.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: MetricKind,
    pub labels: &'static [&'static str],
}

macro_rules! metric {
    ($ident:ident, $name:literal, $kind:ident, $desc:literal) => {
        pub const $ident: MetricDefinition = MetricDefinition {
            name: $name,
            description: $desc,
            kind: MetricKind::$kind,
            labels: &[],
        };
    };
    ($ident:ident, $name:literal, $kind:ident, $desc:literal, [$($label:literal),*]) => {
        pub const $ident: MetricDefinition = MetricDefinition {
            name: $name,
            description: $desc,
            kind: MetricKind::$kind,
            labels: &[$($label),*],
        };
    };
}

// Timing
metric!(
    QUERY_PLANNING_TIME_MS,
    "query_planning_time_ms",
    Counter,
    "Time until the first result was available",
    ["database"]
);
metric!(
    QUERY_PROCESSING_TIME_MS,
    "query_processing_time_ms",
    Counter,
    "Time taken to consume the result",
    ["database"]
);
metric!(
    QUERY_TOTAL_TIME_MS,
    "query_total_time_ms",
    Counter,
    "Planning plus processing time",
    ["database"]
);
metric!(
    QUERY_PROTOCOL_TIME_MS,
    "query_protocol_time_ms",
    Counter,
    "Time reported by the bulk-iteration procedure",
    ["database"]
);
metric!(
    QUERY_EXECUTION_TIME_SECONDS,
    "query_execution_time_seconds",
    Histogram,
    "Wall-clock time of one executor operation",
    ["operation", "database"]
);

// Writes
metric!(NODES_CREATED, "nodes_created_total", Counter, "Nodes created", ["database"]);
metric!(NODES_DELETED, "nodes_deleted_total", Counter, "Nodes deleted", ["database"]);
metric!(
    RELATIONSHIPS_CREATED,
    "relationships_created_total",
    Counter,
    "Relationships created",
    ["database"]
);
metric!(
    RELATIONSHIPS_DELETED,
    "relationships_deleted_total",
    Counter,
    "Relationships deleted",
    ["database"]
);
metric!(PROPERTIES_SET, "properties_set_total", Counter, "Properties set", ["database"]);
metric!(LABELS_ADDED, "labels_added_total", Counter, "Labels added", ["database"]);
metric!(LABELS_REMOVED, "labels_removed_total", Counter, "Labels removed", ["database"]);
metric!(CONSTRAINTS_ADDED, "constraints_added_total", Counter, "Constraints added", ["database"]);
metric!(
    CONSTRAINTS_REMOVED,
    "constraints_removed_total",
    Counter,
    "Constraints removed",
    ["database"]
);
metric!(INDEXES_ADDED, "indexes_added_total", Counter, "Indexes added", ["database"]);
metric!(INDEXES_REMOVED, "indexes_removed_total", Counter, "Indexes removed", ["database"]);
metric!(
    QUERIES_EXECUTED,
    "queries_executed_total",
    Counter,
    "Statements executed inside transactions",
    ["database"]
);

// Bulk iteration
metric!(
    BATCHES_PROCESSED,
    "batches_processed_total",
    Counter,
    "Server-side batches processed",
    ["database"]
);
metric!(
    FAILED_BATCHES,
    "batches_failed_total",
    Counter,
    "Server-side batches that failed",
    ["database"]
);
metric!(
    COMMITTED_OPERATIONS,
    "committed_operations_total",
    Counter,
    "Operations committed by bulk iteration",
    ["database"]
);
metric!(
    FAILED_OPERATIONS,
    "failed_operations_total",
    Counter,
    "Operations failed by bulk iteration",
    ["database"]
);
metric!(
    BATCH_RETRIES,
    "batches_retried_total",
    Counter,
    "Retries performed by the bulk-iteration procedure",
    ["database"]
);
metric!(
    BATCH_TERMINATED,
    "batches_terminated_total",
    Counter,
    "Bulk iterations terminated before completion",
    ["database"]
);
metric!(
    BATCH_ERROR_MESSAGES,
    "batches_error_messages_total",
    Counter,
    "Distinct error messages reported by bulk iteration",
    ["database"]
);

// Errors
metric!(
    QUERY_ERRORS,
    "query_errors_total",
    Counter,
    "Errors and warnings raised while running statements",
    ["error_type", "database"]
);
metric!(
    FAILED_QUERIES,
    "failed_queries_total",
    Counter,
    "Executor operations that returned an error",
    ["operation", "database"]
);

// Transactions
metric!(
    TRANSACTIONS_STARTED,
    "transactions_started_total",
    Counter,
    "Remote transactions begun",
    ["database"]
);
metric!(
    TRANSACTION_COMMITS,
    "transaction_commits_total",
    Counter,
    "Transactions committed",
    ["database"]
);
metric!(
    TRANSACTION_ROLLBACKS,
    "transaction_rollbacks_total",
    Counter,
    "Transactions rolled back",
    ["reason", "database"]
);
metric!(TRANSACTIONS_ACTIVE, "transactions_active", Gauge, "Transactions currently tracked");
metric!(
    QUERY_RETRIES,
    "query_retries_total",
    Counter,
    "Transaction retries",
    ["error_type", "database"]
);
metric!(
    RETRY_DELAY_SECONDS,
    "retry_delay_seconds",
    Histogram,
    "Backoff slept before a retry",
    ["error_type", "database"]
);

// Sessions
metric!(SESSIONS_ACTIVE, "sessions_active", Gauge, "Sessions currently tracked");
metric!(SESSIONS_CREATED, "sessions_created_total", Counter, "Sessions opened", ["database"]);
metric!(
    SESSIONS_CLOSED,
    "sessions_closed_total",
    Counter,
    "Sessions closed",
    ["outcome", "database"]
);

// Connection
metric!(CONNECTION_RECREATED, "connection_recreated_total", Counter, "Client handle replacements");

pub const ALL: &[MetricDefinition] = &[
    QUERY_PLANNING_TIME_MS,
    QUERY_PROCESSING_TIME_MS,
    QUERY_TOTAL_TIME_MS,
    QUERY_PROTOCOL_TIME_MS,
    QUERY_EXECUTION_TIME_SECONDS,
    NODES_CREATED,
    NODES_DELETED,
    RELATIONSHIPS_CREATED,
    RELATIONSHIPS_DELETED,
    PROPERTIES_SET,
    LABELS_ADDED,
    LABELS_REMOVED,
    CONSTRAINTS_ADDED,
    CONSTRAINTS_REMOVED,
    INDEXES_ADDED,
    INDEXES_REMOVED,
    QUERIES_EXECUTED,
    BATCHES_PROCESSED,
    FAILED_BATCHES,
    COMMITTED_OPERATIONS,
    FAILED_OPERATIONS,
    BATCH_RETRIES,
    BATCH_TERMINATED,
    BATCH_ERROR_MESSAGES,
    QUERY_ERRORS,
    FAILED_QUERIES,
    TRANSACTIONS_STARTED,
    TRANSACTION_COMMITS,
    TRANSACTION_ROLLBACKS,
    TRANSACTIONS_ACTIVE,
    QUERY_RETRIES,
    RETRY_DELAY_SECONDS,
    SESSIONS_ACTIVE,
    SESSIONS_CREATED,
    SESSIONS_CLOSED,
    CONNECTION_RECREATED,
];

/// Look up a definition by its exported name
pub fn find(name: &str) -> Option<&'static MetricDefinition> {
    ALL.iter().find(|definition| definition.name == name)
}
