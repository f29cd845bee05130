// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Session data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;

use crate::connection::RemoteSession;

/// Opaque session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        SessionId(format!("session_{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Created,
    Active,
    Idle,
    Closing,
    Closed,
    Error,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Closed | SessionStatus::Error)
    }

    /// Whether the lifecycle allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        match (self, next) {
            (from, _) if from.is_terminal() => false,
            (_, Error) => true,
            (Created, Active) | (Active, Idle) | (Idle, Active) => true,
            (Closing, Closed) => true,
            (Closing, _) => false,
            (_, Closing) => true,
            _ => false,
        }
    }
}

/// Per-session counters that callers may bump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionCounter {
    QueriesExecuted,
    TransactionsStarted,
    TransactionsCommitted,
    TransactionsRolledBack,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCounters {
    pub queries_executed: u64,
    pub transactions_started: u64,
    pub transactions_committed: u64,
    pub transactions_rolled_back: u64,
}

impl SessionCounters {
    pub fn bump(&mut self, counter: SessionCounter, delta: u64) {
        let field = match counter {
            SessionCounter::QueriesExecuted => &mut self.queries_executed,
            SessionCounter::TransactionsStarted => &mut self.transactions_started,
            SessionCounter::TransactionsCommitted => &mut self.transactions_committed,
            SessionCounter::TransactionsRolledBack => &mut self.transactions_rolled_back,
        };
        *field = field.saturating_add(delta);
    }

    pub fn get(&self, counter: SessionCounter) -> u64 {
        match counter {
            SessionCounter::QueriesExecuted => self.queries_executed,
            SessionCounter::TransactionsStarted => self.transactions_started,
            SessionCounter::TransactionsCommitted => self.transactions_committed,
            SessionCounter::TransactionsRolledBack => self.transactions_rolled_back,
        }
    }
}

/// Bookkeeping for one tracked session
#[derive(Debug, Clone)]
pub struct SessionState {
    pub id: SessionId,
    pub status: SessionStatus,
    pub database: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Instant,
    pub counters: SessionCounters,
    pub errors: Vec<String>,
}

impl SessionState {
    pub fn new(id: SessionId, database: Option<String>) -> Self {
        Self {
            id,
            status: SessionStatus::Created,
            database,
            created_at: Utc::now(),
            last_used_at: Instant::now(),
            counters: SessionCounters::default(),
            errors: Vec::new(),
        }
    }

    /// Move to `next` if the lifecycle allows it
    pub fn transition(&mut self, next: SessionStatus) -> bool {
        if self.status == next {
            return true;
        }
        if self.status.can_transition_to(next) {
            self.status = next;
            true
        } else {
            log::debug!(
                "Ignoring session {} transition {:?} -> {:?}",
                self.id,
                self.status,
                next
            );
            false
        }
    }

    pub fn touch(&mut self) {
        self.last_used_at = Instant::now();
        self.transition(SessionStatus::Active);
    }

    pub fn is_reapable(&self, timeout: std::time::Duration) -> bool {
        matches!(self.status, SessionStatus::Active | SessionStatus::Idle)
            && self.last_used_at.elapsed() >= timeout
    }
}

/// Metric label used for sessions on the server's default database
pub const DEFAULT_DATABASE_LABEL: &str = "default";

pub(crate) fn database_label(database: Option<&str>) -> &str {
    database.unwrap_or(DEFAULT_DATABASE_LABEL)
}

/// Caller-held handle to a tracked session
#[derive(Clone)]
pub struct SessionHandle {
    id: SessionId,
    database: Option<String>,
    remote: Arc<dyn RemoteSession>,
}

impl SessionHandle {
    pub(crate) fn new(
        id: SessionId,
        database: Option<String>,
        remote: Arc<dyn RemoteSession>,
    ) -> Self {
        Self {
            id,
            database,
            remote,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    /// Value of the `database` metric label
    pub fn database_label(&self) -> &str {
        database_label(self.database())
    }

    pub fn remote(&self) -> &Arc<dyn RemoteSession> {
        &self.remote
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("database", &self.database)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_format() {
        let id = SessionId::new();
        assert!(id.as_str().starts_with("session_"));
        assert_ne!(id, SessionId::new());
    }

    #[test]
    fn test_lifecycle_transitions() {
        use SessionStatus::*;
        assert!(Created.can_transition_to(Active));
        assert!(Active.can_transition_to(Idle));
        assert!(Idle.can_transition_to(Active));
        assert!(Idle.can_transition_to(Closing));
        assert!(Closing.can_transition_to(Closed));
        assert!(Active.can_transition_to(Error));
        assert!(!Closing.can_transition_to(Active));
        assert!(!Closed.can_transition_to(Active));
        assert!(!Error.can_transition_to(Closing));
        assert!(!Created.can_transition_to(Closed));
    }

    #[test]
    fn test_counters_bump() {
        let mut counters = SessionCounters::default();
        counters.bump(SessionCounter::TransactionsRolledBack, 2);
        counters.bump(SessionCounter::QueriesExecuted, 1);
        assert_eq!(counters.get(SessionCounter::TransactionsRolledBack), 2);
        assert_eq!(counters.queries_executed, 1);
        assert_eq!(counters.transactions_committed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_activates_and_reapability() {
        let mut state = SessionState::new(SessionId::new(), None);
        let timeout = std::time::Duration::from_secs(10);
        // CREATED sessions are never reaped
        tokio::time::advance(timeout).await;
        assert!(!state.is_reapable(timeout));

        state.touch();
        assert_eq!(state.status, SessionStatus::Active);
        assert!(!state.is_reapable(timeout));

        tokio::time::advance(timeout).await;
        assert!(state.is_reapable(timeout));
    }
}
