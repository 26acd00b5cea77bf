//! Cross-validation driver
//!
//! Trains and evaluates a fresh model per fold, in parallel on a bounded
//! worker pool, then aggregates the per-fold metrics. A fold failure aborts
//! the whole run; a partial aggregate over surviving folds would silently
//! bias the result.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::folds::{self, Fold};
use super::metrics::ValidationMetrics;
use crate::dataset::Dataset;
use crate::error::{KilnError, Result};
use crate::training::{Learner, TrainingParameters};

/// Cross-validation run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Fold count `k`; must satisfy `2 <= k <= n`
    pub folds: usize,
    /// Seed for the fold shuffle
    pub seed: u64,
    /// Bounded worker-pool size; `None` uses the shared global pool
    pub n_workers: Option<usize>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            folds: 5,
            seed: 0,
            n_workers: None,
        }
    }
}

impl ValidationConfig {
    pub fn new(folds: usize) -> Self {
        Self {
            folds,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_workers(mut self, n_workers: usize) -> Self {
        self.n_workers = Some(n_workers);
        self
    }
}

/// Metrics produced by one fold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoldOutcome {
    pub fold: usize,
    pub metrics: ValidationMetrics,
}

/// Result of a full cross-validation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossValidationReport {
    /// Per-fold outcomes, ordered by fold index
    pub folds: Vec<FoldOutcome>,
    /// Family-wise mean over all folds
    pub aggregate: ValidationMetrics,
    pub k: usize,
    pub seed: u64,
}

impl CrossValidationReport {
    /// Summary statistics of the primary metric across folds
    pub fn summary(&self) -> MetricSummary {
        let scores: Vec<f64> = self.folds.iter().map(|f| f.metrics.primary()).collect();
        MetricSummary::from_scores(&scores)
    }
}

/// Mean, spread and sample size of a metric across folds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub std_dev: f64,
    pub n: usize,
}

impl MetricSummary {
    pub fn from_scores(scores: &[f64]) -> Self {
        let n = scores.len();
        if n == 0 {
            return Self {
                mean: 0.0,
                std_dev: 0.0,
                n: 0,
            };
        }
        let mean = scores.iter().sum::<f64>() / n as f64;
        let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n as f64;
        Self {
            mean,
            std_dev: variance.sqrt(),
            n,
        }
    }
}

/// Opaque accept/reject decision over two metric summaries.
///
/// Supplied by the caller; the statistical test itself (t-test, z-test, ...)
/// is an external collaborator and is never implemented here.
pub type SignificanceTest = fn(baseline: &MetricSummary, candidate: &MetricSummary, alpha: f64) -> bool;

/// Decide whether `candidate` significantly improves on `baseline`,
/// delegating the decision to the supplied test.
pub fn significant_improvement(
    baseline: &CrossValidationReport,
    candidate: &CrossValidationReport,
    test: SignificanceTest,
    alpha: f64,
) -> bool {
    test(&baseline.summary(), &candidate.summary(), alpha)
}

/// Drives fold partitioning, per-fold training and metric aggregation
#[derive(Debug, Clone)]
pub struct CrossValidator {
    config: ValidationConfig,
}

impl CrossValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Cross-validate `learner` over `dataset`.
    ///
    /// Each fold trains a fresh, isolated model on its training partition
    /// and evaluates it on the held-out test partition. The dataset is
    /// shared read-only across folds; learned state never is. Any fold
    /// error aborts the run with no aggregate. The aggregate is computed
    /// over outcomes sorted by fold index, so it does not depend on
    /// completion order.
    pub fn validate<L: Learner>(
        &self,
        learner: &L,
        dataset: &Dataset,
        params: &TrainingParameters,
    ) -> Result<CrossValidationReport> {
        let plan = folds::partition(dataset.len(), self.config.folds, self.config.seed)?;

        let run = |fold_set: &[Fold]| -> Result<Vec<FoldOutcome>> {
            fold_set
                .par_iter()
                .map(|fold| {
                    debug!(fold = fold.index, "training fold");
                    let model = learner.fit(&dataset.view(&fold.train), params)?;
                    let metrics = learner.evaluate(&model, &dataset.view(&fold.test))?;
                    Ok(FoldOutcome {
                        fold: fold.index,
                        metrics,
                    })
                })
                .collect()
        };

        let mut outcomes = match self.config.n_workers {
            Some(n_workers) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n_workers)
                    .build()
                    .map_err(|e| KilnError::ThreadPoolError(e.to_string()))?;
                pool.install(|| run(plan.folds()))?
            }
            None => run(plan.folds())?,
        };

        outcomes.sort_by_key(|o| o.fold);
        let per_fold: Vec<ValidationMetrics> =
            outcomes.iter().map(|o| o.metrics.clone()).collect();
        let aggregate = ValidationMetrics::average(&per_fold)?;

        info!(
            k = plan.k(),
            seed = plan.seed(),
            primary = aggregate.primary(),
            "cross-validation complete"
        );
        Ok(CrossValidationReport {
            folds: outcomes,
            aggregate,
            k: plan.k(),
            seed: plan.seed(),
        })
    }
}
