//! Training inputs and learned outputs
//!
//! `TrainingParameters` is the immutable configuration a fit consumes;
//! `ModelParameters` is the learned state it produces. Both are plain
//! values: cloning a `ModelParameters` is a full snapshot, so parallel
//! folds can never alias mutable learned state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::validation::ValidationConfig;

/// Immutable configuration consumed by `fit`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingParameters {
    pub seed: u64,
    pub max_iterations: usize,
    pub learning_rate: f64,
    /// When set, `fit` cross-validates the configuration before the final
    /// training pass
    pub validation: Option<ValidationConfig>,
    /// Free-form algorithm-specific knobs
    pub extra: BTreeMap<String, f64>,
}

impl Default for TrainingParameters {
    fn default() -> Self {
        Self {
            seed: 0,
            max_iterations: 100,
            learning_rate: 0.1,
            validation: None,
            extra: BTreeMap::new(),
        }
    }
}

impl TrainingParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_validation(mut self, config: ValidationConfig) -> Self {
        self.validation = Some(config);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: f64) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// One learned quantity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Scalar(f64),
    Vector(Vec<f64>),
    Text(String),
}

/// Learned state produced by `fit`.
///
/// A flat map of named values with full value semantics; `clone` is an
/// explicit, complete snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelParameters {
    entries: BTreeMap<String, ParamValue>,
}

impl ModelParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: ParamValue) {
        self.entries.insert(key.into(), value);
    }

    pub fn set_scalar(&mut self, key: impl Into<String>, value: f64) {
        self.set(key, ParamValue::Scalar(value));
    }

    pub fn set_vector(&mut self, key: impl Into<String>, value: Vec<f64>) {
        self.set(key, ParamValue::Vector(value));
    }

    pub fn set_text(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.set(key, ParamValue::Text(value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.get(key)
    }

    pub fn scalar(&self, key: &str) -> Option<f64> {
        match self.entries.get(key) {
            Some(ParamValue::Scalar(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn vector(&self, key: &str) -> Option<&[f64]> {
        match self.entries.get(key) {
            Some(ParamValue::Vector(v)) => Some(v),
            _ => None,
        }
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.entries.get(key) {
            Some(ParamValue::Text(v)) => Some(v),
            _ => None,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
