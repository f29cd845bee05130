// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Parameter batches and their two statement renderings
//!
//! A [`ParameterBatch`] is one mutation template plus an ordered sequence of
//! parameter sets. It can be sent to the engine in two ways:
//!
//! - **server-iterated**: a single `apoc.periodic.iterate` call. The server
//!   chunks the sequence and answers with one aggregated summary row.
//! - **client-unwound**: the sequence travels as one parameter and is fanned
//!   out through `apoc.cypher.doIt`, one result row per element.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::statement::{Parameters, Statement};

/// Iterable used when the parameter sets come from the client
pub const UNWIND_ITERABLE: &str = "UNWIND $batched_parameter_sets AS params RETURN params";

/// Fields of the aggregated bulk-iteration row
pub const BATCH_RESPONSE_FIELDS: &[&str] = &[
    "batches",
    "total",
    "timeTaken",
    "committedOperations",
    "failedOperations",
    "failedBatches",
    "retries",
    "errorMessages",
    "wasTerminated",
    "updateStatistics",
];

pub const SERVER_ITERATED_TEMPLATE: &str = "CALL apoc.periodic.iterate(\
$iterable_query, \
$batched_query, \
{batchSize: $chunk_size, parallel: $execute_chunks_in_parallel, retries: $retries_per_chunk, params: $iterate_params}\
) \
YIELD batches, total, timeTaken, committedOperations, failedOperations, failedBatches, retries, errorMessages, wasTerminated, updateStatistics \
RETURN batches, total, timeTaken, committedOperations, failedOperations, failedBatches, retries, errorMessages, wasTerminated, updateStatistics";

pub const CLIENT_UNWOUND_TEMPLATE: &str = "UNWIND $iterate_params.batched_parameter_sets AS param \
CALL apoc.cypher.doIt($batched_query, {params: param}) \
YIELD value \
RETURN value";

/// How a parameter batch is shipped to the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolMode {
    #[default]
    ServerIterated,
    ClientUnwound,
}

/// Server-side chunking options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOptions {
    pub batch_size: usize,
    pub parallel: bool,
    pub max_retries: u32,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            parallel: true,
            max_retries: 3,
        }
    }
}

impl BatchOptions {
    pub(crate) fn to_parameters(self) -> Parameters {
        let mut parameters = Parameters::new();
        parameters.insert("chunk_size".to_string(), Value::from(self.batch_size));
        parameters.insert(
            "execute_chunks_in_parallel".to_string(),
            Value::Bool(self.parallel),
        );
        parameters.insert("retries_per_chunk".to_string(), Value::from(self.max_retries));
        parameters
    }
}

/// One mutation template applied to many parameter sets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterBatch {
    pub template_text: String,
    pub parameter_sets: Vec<Parameters>,
}

impl ParameterBatch {
    pub fn new(template_text: impl Into<String>, parameter_sets: Vec<Parameters>) -> Self {
        Self {
            template_text: template_text.into(),
            parameter_sets,
        }
    }

    pub fn len(&self) -> usize {
        self.parameter_sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameter_sets.is_empty()
    }

    /// Render the batch as a single statement
    ///
    /// Pure. An empty batch is valid and renders a statement that iterates
    /// zero times.
    pub fn to_statement(&self, mode: ProtocolMode, options: &BatchOptions) -> Statement {
        let sets = self
            .parameter_sets
            .iter()
            .cloned()
            .map(Value::Object)
            .collect::<Vec<_>>();

        let mut iterate_params = Parameters::new();
        iterate_params.insert("batched_parameter_sets".to_string(), Value::Array(sets));

        let mut parameters = options.to_parameters();
        parameters.insert("iterate_params".to_string(), Value::Object(iterate_params));
        parameters.insert(
            "batched_query".to_string(),
            Value::String(self.template_text.clone()),
        );
        parameters.insert(
            "iterable_query".to_string(),
            Value::String(UNWIND_ITERABLE.to_string()),
        );

        match mode {
            ProtocolMode::ServerIterated => {
                Statement::batch_protocol(SERVER_ITERATED_TEMPLATE, parameters)
            }
            ProtocolMode::ClientUnwound => Statement::new(CLIENT_UNWOUND_TEMPLATE, parameters),
        }
    }
}
