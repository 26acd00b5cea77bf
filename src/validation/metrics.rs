//! Per-family validation metrics
//!
//! One tagged enum covers every algorithm family; averaging is defined only
//! within a family. The family is fixed at construction, not by inheritance.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{KilnError, Result};

/// Algorithm family a metrics value (or a learner) belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricsFamily {
    Classification,
    Regression,
    Survival,
}

impl std::fmt::Display for MetricsFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MetricsFamily::Classification => "classification",
            MetricsFamily::Regression => "regression",
            MetricsFamily::Survival => "survival",
        };
        f.write_str(name)
    }
}

/// Classification results for one evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
}

impl ClassificationMetrics {
    /// Compute metrics from labels and predictions, thresholded at 0.5
    pub fn from_predictions(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let n = y_true.len();
        let correct = y_true
            .iter()
            .zip(y_pred.iter())
            .filter(|(t, p)| (*t - *p).abs() < 0.5)
            .count();
        let accuracy = if n > 0 { correct as f64 / n as f64 } else { 0.0 };

        let mut tp = 0usize;
        let mut fp = 0usize;
        let mut fn_ = 0usize;
        for (t, p) in y_true.iter().zip(y_pred.iter()) {
            let t_bool = *t > 0.5;
            let p_bool = *p > 0.5;
            match (t_bool, p_bool) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (true, false) => fn_ += 1,
                (false, false) => {}
            }
        }

        let precision = if tp + fp > 0 {
            tp as f64 / (tp + fp) as f64
        } else {
            0.0
        };
        let recall = if tp + fn_ > 0 {
            tp as f64 / (tp + fn_) as f64
        } else {
            0.0
        };
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            accuracy,
            precision,
            recall,
            f1_score,
        }
    }

    fn mean_of(items: &[&Self]) -> Self {
        let n = items.len() as f64;
        Self {
            accuracy: items.iter().map(|m| m.accuracy).sum::<f64>() / n,
            precision: items.iter().map(|m| m.precision).sum::<f64>() / n,
            recall: items.iter().map(|m| m.recall).sum::<f64>() / n,
            f1_score: items.iter().map(|m| m.f1_score).sum::<f64>() / n,
        }
    }
}

/// Regression error statistics for one evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
}

impl RegressionMetrics {
    pub fn from_predictions(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let n = y_true.len() as f64;
        let errors: Vec<f64> = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| t - p)
            .collect();

        let mse = errors.iter().map(|e| e * e).sum::<f64>() / n;
        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

        let y_mean = y_true.iter().sum::<f64>() / n;
        let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
        let ss_res: f64 = errors.iter().map(|e| e.powi(2)).sum();
        let r2 = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

        Self {
            mse,
            rmse: mse.sqrt(),
            mae,
            r2,
        }
    }

    fn mean_of(items: &[&Self]) -> Self {
        let n = items.len() as f64;
        Self {
            mse: items.iter().map(|m| m.mse).sum::<f64>() / n,
            rmse: items.iter().map(|m| m.rmse).sum::<f64>() / n,
            mae: items.iter().map(|m| m.mae).sum::<f64>() / n,
            r2: items.iter().map(|m| m.r2).sum::<f64>() / n,
        }
    }
}

/// Survival results for one evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurvivalMetrics {
    /// Concordance index of risk scores against observed times
    pub concordance: f64,
    /// Fraction of censored observations
    pub censoring_rate: f64,
}

impl SurvivalMetrics {
    /// Compute the concordance index over comparable pairs.
    ///
    /// A pair `(i, j)` is comparable when `i` has an observed event before
    /// `j`'s time; it is concordant when the model assigns `i` the higher
    /// risk. Ties in risk count half.
    pub fn from_predictions(times: &Array1<f64>, events: &[bool], risk: &Array1<f64>) -> Self {
        let n = times.len();
        let mut comparable = 0.0;
        let mut concordant = 0.0;
        for i in 0..n {
            if !events[i] {
                continue;
            }
            for j in 0..n {
                if i == j || times[i] >= times[j] {
                    continue;
                }
                comparable += 1.0;
                if risk[i] > risk[j] {
                    concordant += 1.0;
                } else if risk[i] == risk[j] {
                    concordant += 0.5;
                }
            }
        }

        let censored = events.iter().filter(|e| !**e).count();
        Self {
            concordance: if comparable > 0.0 {
                concordant / comparable
            } else {
                0.0
            },
            censoring_rate: if n > 0 { censored as f64 / n as f64 } else { 0.0 },
        }
    }

    fn mean_of(items: &[&Self]) -> Self {
        let n = items.len() as f64;
        Self {
            concordance: items.iter().map(|m| m.concordance).sum::<f64>() / n,
            censoring_rate: items.iter().map(|m| m.censoring_rate).sum::<f64>() / n,
        }
    }
}

/// Result of evaluating one trained model on held-out data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValidationMetrics {
    Classification(ClassificationMetrics),
    Regression(RegressionMetrics),
    Survival(SurvivalMetrics),
}

impl ValidationMetrics {
    pub fn family(&self) -> MetricsFamily {
        match self {
            ValidationMetrics::Classification(_) => MetricsFamily::Classification,
            ValidationMetrics::Regression(_) => MetricsFamily::Regression,
            ValidationMetrics::Survival(_) => MetricsFamily::Survival,
        }
    }

    /// The headline metric of each family: accuracy, r2 or concordance
    pub fn primary(&self) -> f64 {
        match self {
            ValidationMetrics::Classification(m) => m.accuracy,
            ValidationMetrics::Regression(m) => m.r2,
            ValidationMetrics::Survival(m) => m.concordance,
        }
    }

    /// Field-wise arithmetic mean of a non-empty, family-homogeneous list.
    ///
    /// An empty list or mixed families is a validation error; averaging
    /// across families would silently compare incomparable quantities.
    pub fn average(metrics: &[ValidationMetrics]) -> Result<ValidationMetrics> {
        let first = metrics.first().ok_or_else(|| {
            KilnError::ValidationError("cannot average an empty metrics list".to_string())
        })?;
        let family = first.family();
        if let Some(other) = metrics.iter().find(|m| m.family() != family) {
            return Err(KilnError::ValidationError(format!(
                "cannot average mixed metric families: {} and {}",
                family,
                other.family()
            )));
        }

        Ok(match family {
            MetricsFamily::Classification => {
                let items: Vec<&ClassificationMetrics> = metrics
                    .iter()
                    .filter_map(|m| match m {
                        ValidationMetrics::Classification(c) => Some(c),
                        _ => None,
                    })
                    .collect();
                ValidationMetrics::Classification(ClassificationMetrics::mean_of(&items))
            }
            MetricsFamily::Regression => {
                let items: Vec<&RegressionMetrics> = metrics
                    .iter()
                    .filter_map(|m| match m {
                        ValidationMetrics::Regression(r) => Some(r),
                        _ => None,
                    })
                    .collect();
                ValidationMetrics::Regression(RegressionMetrics::mean_of(&items))
            }
            MetricsFamily::Survival => {
                let items: Vec<&SurvivalMetrics> = metrics
                    .iter()
                    .filter_map(|m| match m {
                        ValidationMetrics::Survival(s) => Some(s),
                        _ => None,
                    })
                    .collect();
                ValidationMetrics::Survival(SurvivalMetrics::mean_of(&items))
            }
        })
    }
}
