// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Connection to the remote graph engine
//!
//! This module provides the remote client seam and the [`Connection`] that
//! owns the live client handle.

pub mod handle;
pub mod remote;

pub use handle::{ClientFactory, Connection};
pub use remote::{
    AccessMode, GraphClient, RemoteSession, RemoteTransaction, RoutingMode, SessionConfig,
};
