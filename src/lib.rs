//! Kiln - model training, validation and persistence core
//!
//! This crate provides the training/validation/persistence core of an ML
//! framework:
//! - Named model storage over interchangeable backends
//! - Deterministic k-fold cross-validation with parallel fold execution
//! - Per-family validation metrics with within-family averaging
//! - A `Trainable` lifecycle (fit, persist, erase, close) for any learner
//!
//! # Modules
//!
//! - [`dataset`] - Immutable record collections and fold views
//! - [`storage`] - Pluggable named persistence (in-memory, disk-backed)
//! - [`validation`] - Fold partitioning, metrics, cross-validation runs
//! - [`training`] - Parameters, the `Learner` contract, lifecycle sessions
//!
//! Concrete learning algorithms live outside this crate; anything
//! implementing [`training::Learner`] plugs into the validator and the
//! session lifecycle.

// Core error handling
pub mod error;

pub mod dataset;
pub mod storage;
pub mod training;
pub mod validation;

pub use error::{KilnError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{KilnError, Result};

    // Datasets
    pub use crate::dataset::{Dataset, DatasetView, Record};

    // Storage
    pub use crate::storage::{build_engine, StorageConfig, StorageEngine, Store};

    // Validation
    pub use crate::validation::{
        CrossValidationReport, CrossValidator, MetricSummary, MetricsFamily, ValidationConfig,
        ValidationMetrics,
    };

    // Training
    pub use crate::training::{
        Learner, ModelParameters, SessionState, TrainSession, Trainable, TrainingParameters,
    };
}
