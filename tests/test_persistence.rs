//! Integration test: model persistence across backends

use std::collections::BTreeMap;

use kiln_ml::dataset::{Dataset, DatasetView, Record};
use kiln_ml::storage::{build_engine, StorageConfig, DISK_BACKEND, MEMORY_BACKEND};
use kiln_ml::training::{
    Learner, ModelParameters, TrainSession, Trainable, TrainingParameters,
};
use kiln_ml::validation::{MetricsFamily, RegressionMetrics, ValidationMetrics};
use kiln_ml::{KilnError, Result};
use ndarray::Array1;
use tempfile::TempDir;

struct MeanLearner;

impl Learner for MeanLearner {
    fn family(&self) -> MetricsFamily {
        MetricsFamily::Regression
    }

    fn fit(&self, data: &DatasetView<'_>, _params: &TrainingParameters) -> Result<ModelParameters> {
        let (_, y) = data.to_matrix()?;
        let mut model = ModelParameters::new();
        model.set_scalar("mean", y.sum() / y.len() as f64);
        model.set_vector("seen", y.to_vec());
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

fn dataset() -> Dataset {
    Dataset::new(
        (0..12)
            .map(|i| {
                let features: BTreeMap<String, f64> =
                    [("x".to_string(), i as f64)].into_iter().collect();
                Record::new(features, Some(i as f64 * 2.0))
            })
            .collect(),
    )
}

#[test]
fn test_memory_round_trip() {
    let engine = build_engine(&StorageConfig::memory()).unwrap();
    assert_eq!(engine.backend_name(), MEMORY_BACKEND);

    let mut session = TrainSession::new(MeanLearner, engine.clone());
    session.fit(&dataset(), TrainingParameters::default()).unwrap();
    session.save("models::mean").unwrap();

    let restored = TrainSession::load(MeanLearner, engine, "models::mean").unwrap();
    assert_eq!(
        restored.model_parameters().unwrap(),
        session.model_parameters().unwrap()
    );
    assert_eq!(
        restored.training_parameters().unwrap(),
        session.training_parameters().unwrap()
    );
}

#[test]
fn test_disk_round_trip_survives_engine_restart() {
    let dir = TempDir::new().unwrap();
    let config = StorageConfig::disk(dir.path());

    let params = TrainingParameters::default().with_seed(5);
    {
        let engine = build_engine(&config).unwrap();
        assert_eq!(engine.backend_name(), DISK_BACKEND);
        let mut session = TrainSession::new(MeanLearner, engine);
        session.fit(&dataset(), params.clone()).unwrap();
        session.save("mean").unwrap();
        session.close().unwrap();
    }

    // A fresh engine over the same directory sees the saved artifacts.
    let engine = build_engine(&config).unwrap();
    assert_eq!(engine.list_saved().unwrap(), vec!["mean".to_string()]);

    let restored = TrainSession::load(MeanLearner, engine, "mean").unwrap();
    assert_eq!(restored.training_parameters().unwrap(), &params);
    assert_eq!(
        restored.model_parameters().unwrap().scalar("mean"),
        Some(11.0)
    );
}

#[test]
fn test_hierarchical_names_on_both_backends() {
    let dir = TempDir::new().unwrap();
    for config in [StorageConfig::memory(), StorageConfig::disk(dir.path())] {
        let engine = build_engine(&config).unwrap();
        // Identical segment syntax; only the joiner differs per backend.
        let name = engine.compose_name(&["experiments", "run-7"]).unwrap();

        let mut session = TrainSession::new(MeanLearner, engine.clone());
        session.fit(&dataset(), TrainingParameters::default()).unwrap();
        session.save(&name).unwrap();

        assert_eq!(engine.list_saved().unwrap(), vec![name.clone()]);
        assert!(TrainSession::load(MeanLearner, engine, &name).is_ok());
    }
}

#[test]
fn test_delete_then_load_is_not_found() {
    let dir = TempDir::new().unwrap();
    let engine = build_engine(&StorageConfig::disk(dir.path())).unwrap();

    let mut session = TrainSession::new(MeanLearner, engine.clone());
    session.fit(&dataset(), TrainingParameters::default()).unwrap();
    session.save("mean").unwrap();
    session.erase().unwrap();

    let err = TrainSession::load(MeanLearner, engine.clone(), "mean").unwrap_err();
    assert!(matches!(err, KilnError::NotFound(_)));
    assert!(engine.list_saved().unwrap().is_empty());
}

#[test]
fn test_resave_overwrites() {
    let engine = build_engine(&StorageConfig::memory()).unwrap();
    let mut session = TrainSession::new(MeanLearner, engine.clone());

    session.fit(&dataset(), TrainingParameters::default()).unwrap();
    session.save("mean").unwrap();

    // Re-fit on a shifted dataset and save under the same name.
    let shifted = Dataset::new(
        (0..4)
            .map(|i| {
                Record::empty()
                    .with_feature("x", i as f64)
                    .with_label(100.0)
            })
            .collect(),
    );
    session.fit(&shifted, TrainingParameters::default()).unwrap();
    session.save("mean").unwrap();

    let restored = TrainSession::load(MeanLearner, engine, "mean").unwrap();
    assert_eq!(
        restored.model_parameters().unwrap().scalar("mean"),
        Some(100.0)
    );
}

/// Classifies everything as the positive class
struct ConstClassifier;

impl Learner for ConstClassifier {
    fn family(&self) -> MetricsFamily {
        MetricsFamily::Classification
    }

    fn fit(&self, _data: &DatasetView<'_>, _params: &TrainingParameters) -> Result<ModelParameters> {
        let mut model = ModelParameters::new();
        model.set_scalar("class", 1.0);
        Ok(model)
    }

    fn evaluate(
        &self,
        model: &ModelParameters,
        data: &DatasetView<'_>,
    ) -> Result<ValidationMetrics> {
        let (_, y) = data.to_matrix()?;
        let class = model
            .scalar("class")
            .ok_or_else(|| KilnError::TrainingError("untrained model".to_string()))?;
        let pred = Array1::from_elem(y.len(), class);
        Ok(ValidationMetrics::Classification(
            kiln_ml::validation::ClassificationMetrics::from_predictions(&y, &pred),
        ))
    }
}

#[test]
fn test_load_rejects_wrong_family() {
    let engine = build_engine(&StorageConfig::memory()).unwrap();
    let mut session = TrainSession::new(MeanLearner, engine.clone());
    session.fit(&dataset(), TrainingParameters::default()).unwrap();
    session.save("mean").unwrap();

    // The manifest records the regression family; a classification learner
    // cannot adopt the stored model.
    let err = TrainSession::load(ConstClassifier, engine, "mean").unwrap_err();
    assert!(matches!(err, KilnError::ValidationError(_)));
}

#[test]
fn test_engine_config_errors() {
    let bad = StorageConfig {
        backend: "tape".to_string(),
        output_dir: None,
    };
    assert!(matches!(
        build_engine(&bad),
        Err(KilnError::ConfigError(_))
    ));

    // A file where the output directory should be is inaccessible.
    let dir = TempDir::new().unwrap();
    let blocked = dir.path().join("occupied");
    std::fs::write(&blocked, b"x").unwrap();
    assert!(matches!(
        build_engine(&StorageConfig::disk(&blocked)),
        Err(KilnError::ConfigError(_))
    ));
}
