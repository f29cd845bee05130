// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Session management module
//!
//! This module provides session tracking with a hard capacity bound and a
//! background reaper for idle sessions.

pub mod manager;
pub mod models;

pub use manager::{SessionManager, SessionManagerConfig, SESSION_CREATION_KEY};
pub use models::{
    SessionCounter, SessionCounters, SessionHandle, SessionId, SessionState, SessionStatus,
    DEFAULT_DATABASE_LABEL,
};
