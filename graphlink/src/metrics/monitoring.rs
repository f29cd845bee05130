// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Monitoring configuration
//!
//! Metric families are switched on and off by name prefix. Explicit
//! include/exclude lists are applied before the family switches.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoringLevel {
    None,
    Basic,
    Detailed,
    Debug,
}

/// Which metric families reach the sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub level: MonitoringLevel,
    pub collect_query_metrics: bool,
    pub collect_session_metrics: bool,
    pub collect_transaction_metrics: bool,
    pub collect_batch_metrics: bool,
    pub collect_error_metrics: bool,
    pub collect_connection_metrics: bool,
    /// When set, only these metrics are emitted
    pub included_metrics: Option<BTreeSet<String>>,
    pub excluded_metrics: Option<BTreeSet<String>>,
    /// Appended to every emitted metric
    pub additional_labels: Option<BTreeMap<String, String>>,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self::detailed()
    }
}

impl MonitoringConfig {
    /// Nothing is emitted
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            level: MonitoringLevel::None,
            collect_query_metrics: false,
            collect_session_metrics: false,
            collect_transaction_metrics: false,
            collect_batch_metrics: false,
            collect_error_metrics: false,
            collect_connection_metrics: false,
            included_metrics: None,
            excluded_metrics: None,
            additional_labels: None,
        }
    }

    /// Query timings, write counters and errors
    pub fn basic() -> Self {
        Self {
            enabled: true,
            level: MonitoringLevel::Basic,
            collect_query_metrics: true,
            collect_error_metrics: true,
            ..Self::disabled()
        }
    }

    /// Every family
    pub fn detailed() -> Self {
        Self {
            enabled: true,
            level: MonitoringLevel::Detailed,
            collect_query_metrics: true,
            collect_session_metrics: true,
            collect_transaction_metrics: true,
            collect_batch_metrics: true,
            collect_error_metrics: true,
            collect_connection_metrics: true,
            ..Self::disabled()
        }
    }

    pub fn debug() -> Self {
        Self {
            level: MonitoringLevel::Debug,
            ..Self::detailed()
        }
    }

    fn family_prefixes(&self) -> [(&'static str, bool); 20] {
        [
            ("query_planning", self.collect_query_metrics),
            ("query_processing", self.collect_query_metrics),
            ("query_total", self.collect_query_metrics),
            ("query_protocol", self.collect_query_metrics),
            ("query_execution", self.collect_query_metrics),
            ("queries_executed", self.collect_query_metrics),
            ("nodes_", self.collect_query_metrics),
            ("relationships_", self.collect_query_metrics),
            ("properties_", self.collect_query_metrics),
            ("labels_", self.collect_query_metrics),
            ("indexes_", self.collect_query_metrics),
            ("constraints_", self.collect_query_metrics),
            ("sessions_", self.collect_session_metrics),
            ("transaction", self.collect_transaction_metrics),
            ("query_retries", self.collect_transaction_metrics),
            ("retry_delay", self.collect_transaction_metrics),
            ("batches_", self.collect_batch_metrics),
            ("committed_operations", self.collect_batch_metrics),
            ("failed_operations", self.collect_batch_metrics),
            ("connection_", self.collect_connection_metrics),
        ]
    }

    /// Whether `name` should be forwarded to the sink
    pub fn should_collect(&self, name: &str) -> bool {
        if !self.enabled {
            return false;
        }
        if let Some(included) = &self.included_metrics {
            if !included.contains(name) {
                return false;
            }
        }
        if let Some(excluded) = &self.excluded_metrics {
            if excluded.contains(name) {
                return false;
            }
        }
        if name.starts_with("query_errors") || name.starts_with("failed_queries") {
            return self.collect_error_metrics;
        }
        self.family_prefixes()
            .iter()
            .any(|(prefix, collect)| *collect && name.starts_with(prefix))
    }

    /// `base` merged with the configured additional labels
    pub fn labels<'a>(&'a self, base: &[(&'a str, &'a str)]) -> Vec<(&'a str, &'a str)> {
        let mut labels = base.to_vec();
        if let Some(additional) = &self.additional_labels {
            for (key, value) in additional {
                labels.retain(|(existing, _)| *existing != key.as_str());
                labels.push((key.as_str(), value.as_str()));
            }
        }
        labels
    }
}
