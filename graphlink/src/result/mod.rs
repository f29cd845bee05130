// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Raw results and normalized statistics

pub mod raw;
pub mod statistics;

pub use raw::{
    Notification, NotificationSeverity, QueryKind, RawResult, Record, ResultSummary,
    UpdateCounters,
};
pub use statistics::{
    BatchResponse, BatchStatistics, QueryResult, QueryStatistics, TimingStatistics,
    WriteStatistics,
};
