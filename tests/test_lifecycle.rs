//! Integration test: Trainable state machine

use kiln_ml::dataset::{Dataset, DatasetView, Record};
use kiln_ml::storage::{build_engine, StorageConfig};
use kiln_ml::training::{
    Learner, ModelParameters, SessionState, TrainSession, Trainable, TrainingParameters,
};
use kiln_ml::validation::{MetricsFamily, RegressionMetrics, ValidationConfig, ValidationMetrics};
use kiln_ml::{KilnError, Result};
use ndarray::Array1;

struct MeanLearner;

impl Learner for MeanLearner {
    fn family(&self) -> MetricsFamily {
        MetricsFamily::Regression
    }

    fn fit(&self, data: &DatasetView<'_>, _params: &TrainingParameters) -> Result<ModelParameters> {
        let (_, y) = data.to_matrix()?;
        let mut model = ModelParameters::new();
        model.set_scalar("mean", y.sum() / y.len() as f64);
        Ok(model)
    }

    fn evaluate(
        &self,
        model: &ModelParameters,
        data: &DatasetView<'_>,
    ) -> Result<ValidationMetrics> {
        let (_, y) = data.to_matrix()?;
        let mean = model
            .scalar("mean")
            .ok_or_else(|| KilnError::TrainingError("untrained model".to_string()))?;
        let pred = Array1::from_elem(y.len(), mean);
        Ok(ValidationMetrics::Regression(
            RegressionMetrics::from_predictions(&y, &pred),
        ))
    }
}

fn dataset(n: usize) -> Dataset {
    Dataset::new(
        (0..n)
            .map(|i| {
                Record::empty()
                    .with_feature("x", i as f64)
                    .with_label(i as f64)
            })
            .collect(),
    )
}

#[test]
fn test_full_lifecycle_walk() {
    let engine = build_engine(&StorageConfig::memory()).unwrap();
    let mut session = TrainSession::new(MeanLearner, engine.clone());
    assert_eq!(session.state(), SessionState::Untrained);

    let params = TrainingParameters::default()
        .with_validation(ValidationConfig::new(5).with_seed(42));
    session.fit(&dataset(10), params).unwrap();
    assert_eq!(session.state(), SessionState::Trained);
    assert!(session.validation_report().is_some());

    session.save("walk").unwrap();
    assert_eq!(session.state(), SessionState::Persisted);

    // Re-fit is allowed from Persisted; persisted artifacts stay behind
    // until an explicit erase or an overwriting save.
    session.fit(&dataset(6), TrainingParameters::default()).unwrap();
    assert_eq!(session.state(), SessionState::Trained);
    assert!(TrainSession::load(MeanLearner, engine.clone(), "walk").is_ok());

    session.erase().unwrap();
    assert_eq!(session.state(), SessionState::Erased);
    assert!(matches!(
        TrainSession::load(MeanLearner, engine, "walk"),
        Err(KilnError::NotFound(_))
    ));

    // Close from a terminal state still releases resources quietly.
    session.close().unwrap();
    assert_eq!(session.state(), SessionState::Erased);
}

#[test]
fn test_illegal_transitions() {
    let engine = build_engine(&StorageConfig::memory()).unwrap();
    let mut session = TrainSession::new(MeanLearner, engine);

    assert!(matches!(
        session.erase(),
        Err(KilnError::LifecycleError(_))
    ));
    assert!(matches!(
        session.save("m"),
        Err(KilnError::LifecycleError(_))
    ));
    assert!(matches!(
        session.model_parameters(),
        Err(KilnError::LifecycleError(_))
    ));

    // Lifecycle errors have no side effects.
    assert_eq!(session.state(), SessionState::Untrained);
}

#[test]
fn test_failed_fit_restores_previous_model() {
    let engine = build_engine(&StorageConfig::memory()).unwrap();
    let mut session = TrainSession::new(MeanLearner, engine);

    session.fit(&dataset(10), TrainingParameters::default()).unwrap();
    let trained = session.model_parameters().unwrap().clone();

    // k > n makes the embedded validation fail before training.
    let bad = TrainingParameters::default().with_validation(ValidationConfig::new(20));
    let err = session.fit(&dataset(10), bad).unwrap_err();
    assert!(matches!(err, KilnError::ValidationError(_)));

    assert_eq!(session.state(), SessionState::Trained);
    assert_eq!(session.model_parameters().unwrap(), &trained);
}

#[test]
fn test_close_from_untrained() {
    let engine = build_engine(&StorageConfig::memory()).unwrap();
    let mut session = TrainSession::new(MeanLearner, engine);
    session.close().unwrap();
    assert_eq!(session.state(), SessionState::Closed);

    assert!(matches!(
        session.fit(&dataset(4), TrainingParameters::default()),
        Err(KilnError::LifecycleError(_))
    ));
}

#[test]
fn test_erase_without_save_is_legal() {
    let engine = build_engine(&StorageConfig::memory()).unwrap();
    let mut session = TrainSession::new(MeanLearner, engine);
    session.fit(&dataset(4), TrainingParameters::default()).unwrap();
    session.erase().unwrap();
    assert_eq!(session.state(), SessionState::Erased);
}
