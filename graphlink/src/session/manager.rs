// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Session management with a bounded registry
//!
//! Sessions are tracked in a registry keyed by session id. The registry is
//! the only place session state lives; handles held by callers are looked up
//! against it on every operation, so a handle whose session was reaped or
//! closed is simply unknown.
//!
//! Capacity is a hard cap: sessions being opened count against it from the
//! moment the capacity check passes until the remote open returns.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::connection::{Connection, RemoteSession, SessionConfig};
use crate::coordinator::config::duration_secs;
use crate::error::{ExecutorError, Result};
use crate::metrics::definitions as metric;
use crate::metrics::MetricsSink;
use crate::txn::CircuitBreaker;

use super::models::{
    database_label, SessionCounter, SessionHandle, SessionId, SessionState, SessionStatus,
};

/// Circuit breaker key guarding session creation
pub const SESSION_CREATION_KEY: &str = "session_creation";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionManagerConfig {
    pub max_sessions: usize,
    #[serde(with = "duration_secs")]
    pub session_timeout: Duration,
    #[serde(with = "duration_secs")]
    pub cleanup_interval: Duration,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            max_sessions: 100,
            session_timeout: Duration::from_secs(300), // 5 minutes
            cleanup_interval: Duration::from_secs(60), // 1 minute
        }
    }
}

struct TrackedSession {
    state: SessionState,
    remote: Arc<dyn RemoteSession>,
}

#[derive(Default)]
struct Registry {
    sessions: HashMap<SessionId, TrackedSession>,
    /// Opens that passed the capacity check but have not returned yet
    pending: usize,
}

impl Registry {
    fn occupied(&self) -> usize {
        self.sessions.len() + self.pending
    }
}

/// Releases a capacity reservation if the open attempt fails or is dropped
///
/// A successful open hands the reservation over to the tracked session under
/// the same lock and disarms the slot.
struct PendingSlot<'a> {
    registry: &'a Mutex<Registry>,
    armed: bool,
}

impl PendingSlot<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut registry = self.registry.lock();
            registry.pending = registry.pending.saturating_sub(1);
        }
    }
}

struct Shared {
    connection: Arc<Connection>,
    registry: Mutex<Registry>,
    breaker: Arc<CircuitBreaker>,
    metrics: Arc<dyn MetricsSink>,
    config: SessionManagerConfig,
}

struct Reaper {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Tracks every open session
pub struct SessionManager {
    shared: Arc<Shared>,
    reaper: Mutex<Option<Reaper>>,
}

impl SessionManager {
    /// Create a session manager
    ///
    /// When called inside a tokio runtime the idle reaper starts immediately;
    /// otherwise call [`SessionManager::start_reaper`] once a runtime exists.
    pub fn new(
        connection: Arc<Connection>,
        breaker: Arc<CircuitBreaker>,
        metrics: Arc<dyn MetricsSink>,
        config: SessionManagerConfig,
    ) -> Self {
        let manager = Self {
            shared: Arc::new(Shared {
                connection,
                registry: Mutex::new(Registry::default()),
                breaker,
                metrics,
                config,
            }),
            reaper: Mutex::new(None),
        };
        if tokio::runtime::Handle::try_current().is_ok() {
            manager.start_reaper();
        } else {
            log::warn!("No tokio runtime available; idle session reaper not started");
        }
        manager
    }

    pub fn config(&self) -> &SessionManagerConfig {
        &self.shared.config
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.shared.connection
    }

    /// Spawn the idle reaper if it is not already running
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_reaper(&self) {
        let mut reaper = self.reaper.lock();
        if reaper.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return;
        }

        let (stop, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run_reaper(
            Arc::downgrade(&self.shared),
            self.shared.config.cleanup_interval,
            stop_rx,
        ));
        *reaper = Some(Reaper { stop, handle });
        log::debug!(
            "Idle session reaper started (interval {:?}, timeout {:?})",
            self.shared.config.cleanup_interval,
            self.shared.config.session_timeout
        );
    }

    /// Stop the reaper, waiting for a sweep in progress to finish
    pub async fn stop_reaper(&self) {
        let reaper = self.reaper.lock().take();
        if let Some(reaper) = reaper {
            let _ = reaper.stop.send(true);
            if let Err(e) = reaper.handle.await {
                log::error!("Idle session reaper ended abnormally: {}", e);
            }
        }
    }

    /// Open and track a new session
    pub async fn get_session(
        &self,
        database: Option<&str>,
        config: Option<&SessionConfig>,
    ) -> Result<SessionHandle> {
        let shared = &self.shared;

        {
            let mut registry = shared.registry.lock();
            let occupied = registry.occupied();
            if occupied >= shared.config.max_sessions {
                log::warn!(
                    "Session limit reached ({} of {})",
                    occupied,
                    shared.config.max_sessions
                );
                return Err(ExecutorError::ResourceExhausted {
                    active: occupied,
                    max: shared.config.max_sessions,
                });
            }
            registry.pending += 1;
        }
        let mut slot = PendingSlot {
            registry: &shared.registry,
            armed: true,
        };

        if !shared.breaker.can_execute(SESSION_CREATION_KEY) {
            return Err(ExecutorError::CircuitOpen(SESSION_CREATION_KEY.to_string()));
        }

        let client = match shared.connection.acquire() {
            Ok(client) => client,
            Err(e) => {
                shared.breaker.record_failure(SESSION_CREATION_KEY);
                log::error!("Failed to acquire graph client: {}", e);
                return Err(e);
            }
        };

        let database = database
            .map(str::to_string)
            .or_else(|| shared.connection.database().map(str::to_string));
        let default_config = SessionConfig::default();
        let session_config = config.unwrap_or(&default_config);

        match client.open_session(database.as_deref(), session_config).await {
            Ok(remote) => {
                let id = SessionId::new();
                let active = {
                    let mut registry = shared.registry.lock();
                    registry.pending = registry.pending.saturating_sub(1);
                    slot.disarm();
                    registry.sessions.insert(
                        id.clone(),
                        TrackedSession {
                            state: SessionState::new(id.clone(), database.clone()),
                            remote: remote.clone(),
                        },
                    );
                    registry.sessions.len()
                };
                shared.breaker.record_success(SESSION_CREATION_KEY);
                shared.metrics.increment(
                    metric::SESSIONS_CREATED.name,
                    1.0,
                    &[("database", database_label(database.as_deref()))],
                );
                shared
                    .metrics
                    .set(metric::SESSIONS_ACTIVE.name, active as f64, &[]);
                log::info!("Opened session {} ({} active)", id, active);
                Ok(SessionHandle::new(id, database, remote))
            }
            Err(e) => {
                shared.breaker.record_failure(SESSION_CREATION_KEY);
                log::error!("Failed to open session: {}", e);
                if matches!(e, ExecutorError::ConnectionFailure(_)) {
                    if let Err(recreate_err) = shared.connection.recreate() {
                        log::error!("Failed to recreate graph client: {}", recreate_err);
                    }
                }
                Err(e)
            }
        }
    }

    /// Close and forget a session
    ///
    /// Unknown or already closing sessions are a no-op. The session is removed
    /// from tracking whether or not the remote close succeeds.
    pub async fn close_session(&self, handle: &SessionHandle) -> Result<()> {
        self.shared.close_by_id(handle.id()).await
    }

    /// Close every tracked session
    ///
    /// Stops the reaper first. Per-session failures are logged and returned;
    /// they never stop the remaining sessions from being closed.
    pub async fn close_all_sessions(&self) -> Vec<(SessionId, ExecutorError)> {
        self.stop_reaper().await;

        let ids: Vec<SessionId> = self.shared.registry.lock().sessions.keys().cloned().collect();
        let mut failures = Vec::new();
        for id in ids {
            if let Err(e) = self.shared.close_by_id(&id).await {
                log::error!("Failed to close session {}: {}", id, e);
                failures.push((id, e));
            }
        }
        log::info!("Closed all sessions ({} failure(s))", failures.len());
        failures
    }

    /// Close sessions idle for longer than the configured timeout
    pub async fn cleanup_idle_sessions(&self) -> usize {
        self.shared.cleanup_idle_sessions().await
    }

    /// Bump one counter of a tracked session
    ///
    /// Also marks the session ACTIVE and stamps its last use.
    pub fn update_session_metrics(
        &self,
        handle: &SessionHandle,
        counter: SessionCounter,
        delta: u64,
    ) -> Result<()> {
        let mut registry = self.shared.registry.lock();
        let tracked = registry
            .sessions
            .get_mut(handle.id())
            .ok_or_else(|| ExecutorError::UnknownSession(handle.id().to_string()))?;
        tracked.state.counters.bump(counter, delta);
        tracked.state.touch();
        Ok(())
    }

    /// Mark a session IDLE once its unit of work is done
    pub fn mark_idle(&self, handle: &SessionHandle) -> Result<()> {
        let mut registry = self.shared.registry.lock();
        let tracked = registry
            .sessions
            .get_mut(handle.id())
            .ok_or_else(|| ExecutorError::UnknownSession(handle.id().to_string()))?;
        if tracked.state.status == SessionStatus::Active {
            tracked.state.transition(SessionStatus::Idle);
        }
        Ok(())
    }

    /// Record an error against a tracked session without changing its status
    pub fn record_error(&self, handle: &SessionHandle, error: &ExecutorError) {
        if let Some(tracked) = self.shared.registry.lock().sessions.get_mut(handle.id()) {
            tracked.state.errors.push(error.to_string());
        }
    }

    pub fn is_tracked(&self, id: &SessionId) -> bool {
        self.shared.registry.lock().sessions.contains_key(id)
    }

    /// Snapshot of a tracked session
    pub fn session_state(&self, id: &SessionId) -> Option<SessionState> {
        self.shared
            .registry
            .lock()
            .sessions
            .get(id)
            .map(|tracked| tracked.state.clone())
    }

    pub fn session_count(&self) -> usize {
        self.shared.registry.lock().sessions.len()
    }

    pub fn status_counts(&self) -> BTreeMap<SessionStatus, usize> {
        let registry = self.shared.registry.lock();
        let mut counts = BTreeMap::new();
        for tracked in registry.sessions.values() {
            *counts.entry(tracked.state.status).or_insert(0) += 1;
        }
        counts
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Some(reaper) = self.reaper.get_mut().take() {
            let _ = reaper.stop.send(true);
        }
    }
}

impl Shared {
    async fn close_by_id(&self, id: &SessionId) -> Result<()> {
        let (remote, database) = {
            let mut registry = self.registry.lock();
            match registry.sessions.get_mut(id) {
                None => {
                    log::warn!("Attempted to close unknown session {}", id);
                    return Ok(());
                }
                Some(tracked) if tracked.state.status == SessionStatus::Closing => {
                    log::warn!("Session {} is already closing", id);
                    return Ok(());
                }
                Some(tracked) => {
                    tracked.state.transition(SessionStatus::Closing);
                    (tracked.remote.clone(), tracked.state.database.clone())
                }
            }
        };

        let outcome = remote.close().await;

        let active = {
            let mut registry = self.registry.lock();
            if let Some(mut tracked) = registry.sessions.remove(id) {
                match &outcome {
                    Ok(()) => {
                        tracked.state.transition(SessionStatus::Closed);
                    }
                    Err(e) => {
                        tracked.state.transition(SessionStatus::Error);
                        tracked.state.errors.push(e.to_string());
                    }
                }
                log::debug!(
                    "Session {} finished as {:?} after {} queries",
                    id,
                    tracked.state.status,
                    tracked.state.counters.queries_executed
                );
            }
            registry.sessions.len()
        };

        let outcome_label = if outcome.is_ok() { "closed" } else { "error" };
        self.metrics.increment(
            metric::SESSIONS_CLOSED.name,
            1.0,
            &[
                ("outcome", outcome_label),
                ("database", database_label(database.as_deref())),
            ],
        );
        self.metrics
            .set(metric::SESSIONS_ACTIVE.name, active as f64, &[]);

        match outcome {
            Ok(()) => {
                log::info!("Closed session {} ({} active)", id, active);
                Ok(())
            }
            Err(e) => {
                log::error!("Error closing session {}: {}", id, e);
                Err(e)
            }
        }
    }

    async fn cleanup_idle_sessions(&self) -> usize {
        let expired: Vec<SessionId> = {
            let registry = self.registry.lock();
            registry
                .sessions
                .values()
                .filter(|tracked| tracked.state.is_reapable(self.config.session_timeout))
                .map(|tracked| tracked.state.id.clone())
                .collect()
        };

        let mut closed = 0;
        for id in &expired {
            log::info!("Closing idle session {}", id);
            match self.close_by_id(id).await {
                Ok(()) => closed += 1,
                Err(e) => log::error!("Failed to close idle session {}: {}", id, e),
            }
        }
        if !expired.is_empty() {
            log::info!("Reaped {} of {} idle session(s)", closed, expired.len());
        }
        closed
    }
}

async fn run_reaper(shared: Weak<Shared>, interval: Duration, mut stop: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = stop.changed() => break,
        }
        if *stop.borrow() {
            break;
        }
        let Some(shared) = shared.upgrade() else {
            break;
        };
        shared.cleanup_idle_sessions().await;
    }
    log::debug!("Idle session reaper stopped");
}
