// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Statistics parsing
//!
//! Two result schemas exist. A bulk-iteration statement answers with one
//! aggregated row whose fields are decoded into [`BatchResponse`]; every other
//! statement is described by its summary alone. Timing always comes from the
//! outer summary, so the two schemas report comparable durations.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{ExecutorError, Result};
use crate::metrics::definitions as metric;
use crate::metrics::MetricsSink;
use crate::query::Statement;

use super::raw::{QueryKind, RawResult, Record, ResultSummary, UpdateCounters};

/// Per-entity counters inside the aggregated bulk-iteration row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateStatistics {
    pub nodes_created: u64,
    pub nodes_deleted: u64,
    pub relationships_created: u64,
    pub relationships_deleted: u64,
    pub properties_set: u64,
    pub labels_added: u64,
    pub labels_removed: u64,
}

/// The aggregated row returned by server-side bulk iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub batches: u64,
    pub total: u64,
    pub time_taken: u64,
    pub committed_operations: u64,
    pub failed_operations: u64,
    pub failed_batches: u64,
    pub retries: u64,
    /// Error message to occurrence count
    pub error_messages: BTreeMap<String, Value>,
    pub was_terminated: bool,
    #[serde(default)]
    pub update_statistics: Option<BatchUpdateStatistics>,
}

impl BatchResponse {
    pub fn from_record(record: &Record) -> Result<Self> {
        serde_json::from_value(Value::Object(record.clone()))
            .map_err(|e| ExecutorError::MalformedBatchResponse(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingStatistics {
    pub planning_time_ms: u64,
    pub processing_time_ms: u64,
    pub total_time_ms: u64,
    /// `timeTaken` of a bulk iteration, kept apart from the summary timings
    pub protocol_time_ms: u64,
}

impl TimingStatistics {
    fn from_summary(summary: &ResultSummary) -> Self {
        Self {
            planning_time_ms: summary.available_after,
            processing_time_ms: summary.consumed_after,
            total_time_ms: summary.available_after + summary.consumed_after,
            protocol_time_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteStatistics {
    pub nodes_created: u64,
    pub nodes_deleted: u64,
    pub relationships_created: u64,
    pub relationships_deleted: u64,
    pub properties_set: u64,
    pub labels_added: u64,
    pub labels_removed: u64,
    pub constraints_added: u64,
    pub constraints_removed: u64,
    pub indexes_added: u64,
    pub indexes_removed: u64,
}

impl From<&UpdateCounters> for WriteStatistics {
    fn from(counters: &UpdateCounters) -> Self {
        Self {
            nodes_created: counters.nodes_created,
            nodes_deleted: counters.nodes_deleted,
            relationships_created: counters.relationships_created,
            relationships_deleted: counters.relationships_deleted,
            properties_set: counters.properties_set,
            labels_added: counters.labels_added,
            labels_removed: counters.labels_removed,
            constraints_added: counters.constraints_added,
            constraints_removed: counters.constraints_removed,
            indexes_added: counters.indexes_added,
            indexes_removed: counters.indexes_removed,
        }
    }
}

impl From<&BatchUpdateStatistics> for WriteStatistics {
    fn from(update: &BatchUpdateStatistics) -> Self {
        Self {
            nodes_created: update.nodes_created,
            nodes_deleted: update.nodes_deleted,
            relationships_created: update.relationships_created,
            relationships_deleted: update.relationships_deleted,
            properties_set: update.properties_set,
            labels_added: update.labels_added,
            labels_removed: update.labels_removed,
            ..Self::default()
        }
    }
}

/// Bulk-iteration outcome
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStatistics {
    pub batches: u64,
    pub total: u64,
    pub failed_batches: u64,
    pub committed_operations: u64,
    pub failed_operations: u64,
    pub retries: u64,
    pub was_terminated: bool,
    pub error_messages: Vec<String>,
}

impl From<&BatchResponse> for BatchStatistics {
    fn from(response: &BatchResponse) -> Self {
        Self {
            batches: response.batches,
            total: response.total,
            failed_batches: response.failed_batches,
            committed_operations: response.committed_operations,
            failed_operations: response.failed_operations,
            retries: response.retries,
            was_terminated: response.was_terminated,
            error_messages: response.error_messages.keys().cloned().collect(),
        }
    }
}

/// Normalized statistics for one executed statement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStatistics {
    pub query_kind: QueryKind,
    pub timing: TimingStatistics,
    pub writes: WriteStatistics,
    /// Present for bulk-iteration statements only
    pub batch: Option<BatchStatistics>,
    /// Codes of warning or error notifications attached to the summary
    pub notifications: Vec<String>,
}

impl QueryStatistics {
    /// Parse the statistics of `raw`, which was produced by `statement`
    pub fn from_result(statement: &Statement, raw: &RawResult) -> Result<Self> {
        let summary = &raw.summary;
        let mut stats = QueryStatistics {
            query_kind: summary.query_kind,
            timing: TimingStatistics::from_summary(summary),
            ..Self::default()
        };

        for notification in summary.notifications.iter().filter(|n| n.is_problem()) {
            log::warn!(
                "{} ({}): {}",
                notification.title,
                notification.code,
                notification.description
            );
            stats.notifications.push(notification.code.clone());
        }

        match (statement.is_batch_protocol(), raw.records.first()) {
            (true, Some(record)) => {
                let response = BatchResponse::from_record(record)?;
                stats.timing.protocol_time_ms = response.time_taken;
                stats.writes = response
                    .update_statistics
                    .as_ref()
                    .map(WriteStatistics::from)
                    .unwrap_or_default();
                stats.batch = Some(BatchStatistics::from(&response));
            }
            (true, None) => {
                stats.batch = Some(BatchStatistics::default());
            }
            (false, _) => {
                stats.writes = WriteStatistics::from(&summary.counters);
            }
        }

        Ok(stats)
    }

    /// Forward every statistic to `sink` under its fixed metric name
    ///
    /// `labels` are attached to every emitted series.
    pub fn record(&self, sink: &dyn MetricsSink, labels: &[(&str, &str)]) {
        let counters = [
            (metric::QUERY_PLANNING_TIME_MS, self.timing.planning_time_ms),
            (metric::QUERY_PROCESSING_TIME_MS, self.timing.processing_time_ms),
            (metric::QUERY_TOTAL_TIME_MS, self.timing.total_time_ms),
            (metric::QUERY_PROTOCOL_TIME_MS, self.timing.protocol_time_ms),
            (metric::NODES_CREATED, self.writes.nodes_created),
            (metric::NODES_DELETED, self.writes.nodes_deleted),
            (metric::RELATIONSHIPS_CREATED, self.writes.relationships_created),
            (metric::RELATIONSHIPS_DELETED, self.writes.relationships_deleted),
            (metric::PROPERTIES_SET, self.writes.properties_set),
            (metric::LABELS_ADDED, self.writes.labels_added),
            (metric::LABELS_REMOVED, self.writes.labels_removed),
            (metric::CONSTRAINTS_ADDED, self.writes.constraints_added),
            (metric::CONSTRAINTS_REMOVED, self.writes.constraints_removed),
            (metric::INDEXES_ADDED, self.writes.indexes_added),
            (metric::INDEXES_REMOVED, self.writes.indexes_removed),
        ];
        for (definition, value) in counters {
            sink.increment(definition.name, value as f64, labels);
        }

        if let Some(batch) = &self.batch {
            let counters = [
                (metric::BATCHES_PROCESSED, batch.batches),
                (metric::FAILED_BATCHES, batch.failed_batches),
                (metric::COMMITTED_OPERATIONS, batch.committed_operations),
                (metric::FAILED_OPERATIONS, batch.failed_operations),
                (metric::BATCH_RETRIES, batch.retries),
                (metric::BATCH_TERMINATED, u64::from(batch.was_terminated)),
                (metric::BATCH_ERROR_MESSAGES, batch.error_messages.len() as u64),
            ];
            for (definition, value) in counters {
                sink.increment(definition.name, value as f64, labels);
            }
        }

        for code in &self.notifications {
            let mut error_labels = vec![("error_type", code.as_str())];
            error_labels.extend_from_slice(labels);
            sink.increment(metric::QUERY_ERRORS.name, 1.0, &error_labels);
        }
    }
}

/// Rows and statistics for one executed statement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub statement: Statement,
    pub keys: Vec<String>,
    pub records: Vec<Record>,
    pub summary: ResultSummary,
    pub statistics: QueryStatistics,
}

impl QueryResult {
    pub fn from_raw(statement: Statement, raw: RawResult) -> Result<Self> {
        let statistics = QueryStatistics::from_result(&statement, &raw)?;
        Ok(Self {
            statement,
            keys: raw.keys,
            records: raw.records,
            summary: raw.summary,
            statistics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::InMemoryMetrics;
    use crate::query::{BatchOptions, ParameterBatch, ProtocolMode};
    use crate::result::raw::{Notification, NotificationSeverity};
    use serde_json::json;

    fn summary(available_after: u64, consumed_after: u64) -> ResultSummary {
        ResultSummary {
            available_after,
            consumed_after,
            query_kind: QueryKind::Write,
            counters: UpdateCounters {
                nodes_created: 2,
                indexes_removed: 1,
                ..UpdateCounters::default()
            },
            ..ResultSummary::default()
        }
    }

    fn batch_statement() -> Statement {
        ParameterBatch::new("MERGE (n:Person {id: params.id})", Vec::new())
            .to_statement(ProtocolMode::ServerIterated, &BatchOptions::default())
    }

    fn batch_row() -> Record {
        json!({
            "batches": 3,
            "total": 250,
            "timeTaken": 12,
            "committedOperations": 248,
            "failedOperations": 2,
            "failedBatches": 1,
            "retries": 4,
            "errorMessages": {"constraint violated": 2},
            "wasTerminated": false,
            "updateStatistics": {
                "nodesCreated": 248,
                "nodesDeleted": 0,
                "relationshipsCreated": 5,
                "relationshipsDeleted": 0,
                "propertiesSet": 496,
                "labelsAdded": 248,
                "labelsRemoved": 0
            }
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn test_plain_statement_timing_and_counters() {
        let statement = Statement::from_statement("CREATE (n), (m)", Vec::<(String, Value)>::new());
        let raw = RawResult::new(Vec::new(), summary(30, 70));

        let stats = QueryStatistics::from_result(&statement, &raw).unwrap();
        assert_eq!(stats.timing.planning_time_ms, 30);
        assert_eq!(stats.timing.processing_time_ms, 70);
        assert_eq!(stats.timing.total_time_ms, 100);
        assert_eq!(stats.writes.nodes_created, 2);
        assert_eq!(stats.writes.indexes_removed, 1);
        assert!(stats.batch.is_none());
    }

    #[test]
    fn test_batch_row_is_decoded() {
        let raw = RawResult::new(vec![batch_row()], summary(5, 20));
        let stats = QueryStatistics::from_result(&batch_statement(), &raw).unwrap();

        assert_eq!(stats.timing.total_time_ms, 25);
        assert_eq!(stats.timing.protocol_time_ms, 12);
        assert_eq!(stats.writes.nodes_created, 248);
        assert_eq!(stats.writes.relationships_created, 5);
        // summary counters are ignored for bulk iteration
        assert_eq!(stats.writes.indexes_removed, 0);

        let batch = stats.batch.unwrap();
        assert_eq!(batch.committed_operations, 248);
        assert_eq!(batch.failed_operations, 2);
        assert_eq!(batch.failed_batches, 1);
        assert_eq!(batch.error_messages, vec!["constraint violated".to_string()]);
    }

    #[test]
    fn test_missing_update_statistics_means_zero_writes() {
        let mut row = batch_row();
        row.remove("updateStatistics");
        let raw = RawResult::new(vec![row], summary(1, 1));
        let stats = QueryStatistics::from_result(&batch_statement(), &raw).unwrap();
        assert_eq!(stats.writes, WriteStatistics::default());
        assert_eq!(stats.batch.unwrap().batches, 3);
    }

    #[test]
    fn test_malformed_batch_row() {
        let mut row = batch_row();
        row.remove("committedOperations");
        let raw = RawResult::new(vec![row], summary(1, 1));
        let err = QueryStatistics::from_result(&batch_statement(), &raw).unwrap_err();
        assert!(matches!(err, ExecutorError::MalformedBatchResponse(_)));

        let mut row = batch_row();
        row.insert("batches".to_string(), json!("three"));
        let raw = RawResult::new(vec![row], summary(1, 1));
        let err = QueryStatistics::from_result(&batch_statement(), &raw).unwrap_err();
        assert!(matches!(err, ExecutorError::MalformedBatchResponse(_)));
    }

    #[test]
    fn test_empty_batch_yields_zero_statistics() {
        let raw = RawResult::new(Vec::new(), ResultSummary::default());
        let stats = QueryStatistics::from_result(&batch_statement(), &raw).unwrap();
        assert_eq!(stats.writes, WriteStatistics::default());
        assert_eq!(stats.timing, TimingStatistics::default());
        assert_eq!(stats.batch, Some(BatchStatistics::default()));
    }

    #[test]
    fn test_record_forwards_fixed_names() {
        let raw = RawResult::new(vec![batch_row()], summary(5, 20));
        let stats = QueryStatistics::from_result(&batch_statement(), &raw).unwrap();
        let sink = InMemoryMetrics::new();
        stats.record(&sink, &[]);

        assert_eq!(sink.counter("query_total_time_ms"), 25.0);
        assert_eq!(sink.counter("nodes_created_total"), 248.0);
        assert_eq!(sink.counter("committed_operations_total"), 248.0);
        assert_eq!(sink.counter("failed_operations_total"), 2.0);
        assert_eq!(sink.counter("batches_error_messages_total"), 1.0);
        assert_eq!(sink.counter("batches_terminated_total"), 0.0);
    }

    #[test]
    fn test_problem_notifications_are_counted() {
        let mut summary = summary(1, 1);
        summary.notifications = vec![
            Notification {
                code: "Neo.ClientNotification.Statement.CartesianProduct".to_string(),
                title: "cartesian product".to_string(),
                description: String::new(),
                severity: NotificationSeverity::Warning,
            },
            Notification {
                code: "Neo.ClientNotification.Statement.Info".to_string(),
                title: "info".to_string(),
                description: String::new(),
                severity: NotificationSeverity::Information,
            },
        ];
        let statement =
            Statement::from_statement("MATCH (a), (b) RETURN a, b", Vec::<(String, Value)>::new());
        let raw = RawResult::new(Vec::new(), summary);
        let stats = QueryStatistics::from_result(&statement, &raw).unwrap();
        assert_eq!(stats.notifications.len(), 1);

        let sink = InMemoryMetrics::new();
        stats.record(&sink, &[("database", "ingest")]);
        assert_eq!(
            sink.counter_with(
                "query_errors_total",
                &[
                    ("database", "ingest"),
                    ("error_type", "Neo.ClientNotification.Statement.CartesianProduct"),
                ],
            ),
            1.0
        );
        assert_eq!(sink.counter_with("nodes_created_total", &[("database", "ingest")]), 2.0);
    }
}
