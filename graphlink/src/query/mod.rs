// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Statements and parameter batches
//!
//! This module provides the immutable statement model and the two renderings
//! of a bulk parameter batch into a single statement.

pub mod batch;
pub mod statement;

pub use batch::{BatchOptions, ParameterBatch, ProtocolMode};
pub use statement::{Parameters, Statement};
