//! Cross-validation: fold partitioning, per-family metrics, run orchestration

pub mod folds;
mod metrics;
mod validator;

pub use folds::{partition, Fold, FoldPlan};
pub use metrics::{
    ClassificationMetrics, MetricsFamily, RegressionMetrics, SurvivalMetrics, ValidationMetrics,
};
pub use validator::{
    significant_improvement, CrossValidationReport, CrossValidator, FoldOutcome, MetricSummary,
    SignificanceTest, ValidationConfig,
};
