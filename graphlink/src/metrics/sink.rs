// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Metrics sinks

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use super::monitoring::MonitoringConfig;

/// Destination for every metric the executor emits
///
/// Implementations must be cheap and must not block; they are called while
/// the executor is on the hot path.
pub trait MetricsSink: Send + Sync {
    fn increment(&self, name: &str, amount: f64, labels: &[(&str, &str)]);
    fn observe(&self, name: &str, value: f64, labels: &[(&str, &str)]);
    fn set(&self, name: &str, value: f64, labels: &[(&str, &str)]);
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn increment(&self, _name: &str, _amount: f64, _labels: &[(&str, &str)]) {}
    fn observe(&self, _name: &str, _value: f64, _labels: &[(&str, &str)]) {}
    fn set(&self, _name: &str, _value: f64, _labels: &[(&str, &str)]) {}
}

type SeriesKey = (String, Vec<(String, String)>);

fn series_key(name: &str, labels: &[(&str, &str)]) -> SeriesKey {
    let mut labels = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect::<Vec<_>>();
    labels.sort();
    (name.to_string(), labels)
}

#[derive(Default)]
struct Recorded {
    counters: HashMap<SeriesKey, f64>,
    gauges: HashMap<SeriesKey, f64>,
    observations: HashMap<SeriesKey, Vec<f64>>,
}

/// Keeps every metric in memory, keyed by name and label set
#[derive(Default)]
pub struct InMemoryMetrics {
    recorded: Mutex<Recorded>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter total summed over every label set
    pub fn counter(&self, name: &str) -> f64 {
        self.recorded
            .lock()
            .counters
            .iter()
            .filter(|((n, _), _)| n == name)
            .map(|(_, v)| *v)
            .sum()
    }

    /// Counter total for one exact label set
    pub fn counter_with(&self, name: &str, labels: &[(&str, &str)]) -> f64 {
        self.recorded
            .lock()
            .counters
            .get(&series_key(name, labels))
            .copied()
            .unwrap_or(0.0)
    }

    /// Last value set on an unlabelled gauge
    pub fn gauge(&self, name: &str) -> Option<f64> {
        self.recorded
            .lock()
            .gauges
            .get(&series_key(name, &[]))
            .copied()
    }

    /// Every observation of a histogram, across label sets
    pub fn observations(&self, name: &str) -> Vec<f64> {
        self.recorded
            .lock()
            .observations
            .iter()
            .filter(|((n, _), _)| n == name)
            .flat_map(|(_, values)| values.iter().copied())
            .collect()
    }

    /// Whether any metric with this name was recorded
    pub fn contains(&self, name: &str) -> bool {
        let recorded = self.recorded.lock();
        recorded.counters.keys().any(|(n, _)| n == name)
            || recorded.gauges.keys().any(|(n, _)| n == name)
            || recorded.observations.keys().any(|(n, _)| n == name)
    }

    pub fn reset(&self) {
        *self.recorded.lock() = Recorded::default();
    }
}

impl MetricsSink for InMemoryMetrics {
    fn increment(&self, name: &str, amount: f64, labels: &[(&str, &str)]) {
        *self
            .recorded
            .lock()
            .counters
            .entry(series_key(name, labels))
            .or_insert(0.0) += amount;
    }

    fn observe(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        self.recorded
            .lock()
            .observations
            .entry(series_key(name, labels))
            .or_default()
            .push(value);
    }

    fn set(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        self.recorded
            .lock()
            .gauges
            .insert(series_key(name, labels), value);
    }
}

/// Applies a [`MonitoringConfig`] in front of another sink
pub struct FilteredSink {
    inner: Arc<dyn MetricsSink>,
    config: MonitoringConfig,
}

impl FilteredSink {
    pub fn new(inner: Arc<dyn MetricsSink>, config: MonitoringConfig) -> Self {
        Self { inner, config }
    }
}

impl MetricsSink for FilteredSink {
    fn increment(&self, name: &str, amount: f64, labels: &[(&str, &str)]) {
        if self.config.should_collect(name) {
            self.inner.increment(name, amount, &self.config.labels(labels));
        }
    }

    fn observe(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        if self.config.should_collect(name) {
            self.inner.observe(name, value, &self.config.labels(labels));
        }
    }

    fn set(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        if self.config.should_collect(name) {
            self.inner.set(name, value, &self.config.labels(labels));
        }
    }
}
