// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Statement model

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::batch::{BatchOptions, SERVER_ITERATED_TEMPLATE};

/// Named statement parameters
pub type Parameters = Map<String, Value>;

/// A statement text plus its parameters
///
/// Equality compares text and parameters only. `is_batch_protocol` tells the
/// result parser to expect the single aggregated bulk-iteration row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    text: String,
    parameters: Parameters,
    #[serde(default)]
    is_batch_protocol: bool,
}

impl Statement {
    /// Create a plain statement
    pub fn new(text: impl Into<String>, parameters: Parameters) -> Self {
        Self {
            text: text.into(),
            parameters,
            is_batch_protocol: false,
        }
    }

    /// Create a statement from text and `(name, value)` pairs
    pub fn from_statement<I, K>(text: impl Into<String>, parameters: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let parameters = parameters
            .into_iter()
            .map(|(name, value)| (name.into(), value))
            .collect();
        Self::new(text, parameters)
    }

    /// Create a statement whose result is the aggregated bulk-iteration row
    pub fn batch_protocol(text: impl Into<String>, parameters: Parameters) -> Self {
        Self {
            text: text.into(),
            parameters,
            is_batch_protocol: true,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn is_batch_protocol(&self) -> bool {
        self.is_batch_protocol
    }

    /// Use this statement as the server-side iterable of a bulk iteration
    ///
    /// Every row produced by `self` is handed to `batched_text`, chunked by
    /// the server according to `options`. The parameters of `self` travel as
    /// the iteration parameters.
    pub fn feed_batched_query(&self, batched_text: &str, options: &BatchOptions) -> Statement {
        let mut parameters = options.to_parameters();
        parameters.insert(
            "iterate_params".to_string(),
            Value::Object(self.parameters.clone()),
        );
        parameters.insert(
            "batched_query".to_string(),
            Value::String(batched_text.to_string()),
        );
        parameters.insert(
            "iterable_query".to_string(),
            Value::String(self.text.clone()),
        );
        Statement::batch_protocol(SERVER_ITERATED_TEMPLATE, parameters)
    }
}

impl PartialEq for Statement {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text && self.parameters == other.parameters
    }
}

impl Eq for Statement {}
