// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Collaborator traits
//!
//! The pipeline that feeds the executor describes its work through these
//! traits. Implementations are pure producers of statement text and
//! parameters; they never talk to the engine themselves.

use crate::query::{Parameters, Statement};

/// Bulk upsert of one kind of entity
///
/// The template is applied once per entity; inside it the entity's
/// parameters are available as `params`.
pub trait EntityOperation {
    type Entity;

    fn template(&self) -> String;

    fn entity_parameters(&self, entity: &Self::Entity) -> Parameters;
}

/// Bulk upsert of one kind of relationship
pub trait RelationshipOperation {
    type Relationship;

    fn template(&self) -> String;

    fn relationship_parameters(&self, relationship: &Self::Relationship) -> Parameters;
}

/// Time-to-live cleanup
pub trait ExpiryPolicy {
    /// The statement that removes expired data, with the given per-chunk
    /// retry budget when it uses server-side iteration
    fn expiry_statement(&self, retries_per_chunk: u32) -> Statement;
}

/// Arbitrary statement supplied by the pipeline
pub trait IngestionHook {
    fn statement(&self) -> Statement;
}
