// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Result shape returned by the remote client

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One result row, keyed by column name
pub type Record = Map<String, Value>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    #[default]
    Read,
    Write,
    ReadWrite,
    SchemaWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationSeverity {
    Information,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub code: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub severity: NotificationSeverity,
}

impl Notification {
    pub fn is_problem(&self) -> bool {
        matches!(
            self.severity,
            NotificationSeverity::Warning | NotificationSeverity::Error
        )
    }
}

/// Write counters reported by the engine for one statement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateCounters {
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

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultSummary {
    /// Milliseconds until the first row was available
    pub available_after: u64,
    /// Milliseconds until the last row was consumed
    pub consumed_after: u64,
    pub counters: UpdateCounters,
    pub query_kind: QueryKind,
    pub database: Option<String>,
    pub notifications: Vec<Notification>,
}

/// Rows plus summary for one executed statement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawResult {
    pub keys: Vec<String>,
    pub records: Vec<Record>,
    pub summary: ResultSummary,
}

impl RawResult {
    pub fn new(records: Vec<Record>, summary: ResultSummary) -> Self {
        let keys = records
            .first()
            .map(|record| record.keys().cloned().collect())
            .unwrap_or_default();
        Self {
            keys,
            records,
            summary,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}
