// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Transaction state management
//!
//! This module defines the transaction state and lifecycle management.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::query::Statement;
use crate::session::SessionId;

/// Unique identifier for a transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new() -> Self {
        TransactionId(format!("tx_{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Circuit breaker key for this transaction
    pub fn breaker_key(&self) -> String {
        format!("transaction_{}", self.0)
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transaction lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Started,
    Committed,
    RolledBack,
    Failed,
    TimedOut,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Committed
                | TransactionStatus::RolledBack
                | TransactionStatus::TimedOut
        )
    }
}

/// Complete transaction state
#[derive(Debug, Clone, Serialize)]
pub struct TransactionState {
    pub id: TransactionId,
    /// Session that owns this transaction
    pub session_id: SessionId,
    pub status: TransactionStatus,
    pub queries: Vec<Statement>,
    /// Retries performed so far; never reset by a retry
    pub retry_count: u32,
    pub last_retry_time: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl TransactionState {
    pub fn new(session_id: SessionId, queries: Vec<Statement>) -> Self {
        Self {
            id: TransactionId::new(),
            session_id,
            status: TransactionStatus::Started,
            queries,
            retry_count: 0,
            last_retry_time: None,
            error: None,
            started_at: Utc::now(),
        }
    }

    /// Re-enter STARTED for another attempt
    pub fn restart(&mut self) {
        self.status = TransactionStatus::Started;
    }

    pub fn commit(&mut self) {
        self.status = TransactionStatus::Committed;
        self.error = None;
    }

    pub fn fail(&mut self, error: String, retry_count: u32) {
        self.status = TransactionStatus::Failed;
        self.error = Some(error);
        self.retry_count = retry_count;
        self.last_retry_time = Some(Utc::now());
    }
}
