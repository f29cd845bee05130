// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Metrics boundary
//!
//! The executor never owns a registry. It reports through an injected
//! [`MetricsSink`]; [`MonitoringConfig`] decides which metric families reach
//! the sink.

pub mod definitions;
pub mod monitoring;
pub mod sink;

pub use definitions::{MetricDefinition, MetricKind};
pub use monitoring::{MonitoringConfig, MonitoringLevel};
pub use sink::{FilteredSink, InMemoryMetrics, MetricsSink, NoopMetrics};
