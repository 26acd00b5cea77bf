//! Trainable lifecycle orchestration
//!
//! A [`TrainSession`] owns one model's lifecycle from fit through
//! persistence and teardown, composing the storage engine and the
//! cross-validator. The algorithm itself stays behind the [`Learner`]
//! trait; learned state always flows through [`ModelParameters`] values.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::params::{ModelParameters, TrainingParameters};
use crate::dataset::{Dataset, DatasetView};
use crate::error::{KilnError, Result};
use crate::storage::{StorageEngine, Store};
use crate::validation::{
    CrossValidationReport, CrossValidator, MetricsFamily, ValidationMetrics,
};

/// Contract any concrete learning algorithm implements.
///
/// Implementations are stateless with respect to learned parameters: `fit`
/// returns a fresh `ModelParameters` value and `evaluate` only reads one,
/// so one learner instance can serve many folds concurrently.
pub trait Learner: Send + Sync {
    /// Metrics family this learner's evaluations belong to
    fn family(&self) -> MetricsFamily;

    /// Train on a view and return the learned state
    fn fit(&self, data: &DatasetView<'_>, params: &TrainingParameters) -> Result<ModelParameters>;

    /// Evaluate learned state on a held-out view
    fn evaluate(
        &self,
        model: &ModelParameters,
        data: &DatasetView<'_>,
    ) -> Result<ValidationMetrics>;
}

/// Lifecycle contract of a trained model
pub trait Trainable {
    fn fit(&mut self, dataset: &Dataset, params: TrainingParameters) -> Result<()>;
    fn model_parameters(&self) -> Result<&ModelParameters>;
    fn training_parameters(&self) -> Result<&TrainingParameters>;
    /// Delete persisted artifacts tied to this instance. Irreversible.
    fn erase(&mut self) -> Result<()>;
    /// Release runtime-held handles and caches. Idempotent; persisted
    /// content is untouched.
    fn close(&mut self) -> Result<()>;
}

/// Lifecycle states of a [`TrainSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Untrained,
    Fitting,
    Trained,
    Persisted,
    Erased,
    Closed,
}

const KEY_MODEL: &str = "model";
const KEY_PARAMS: &str = "params";
const KEY_MANIFEST: &str = "manifest";

const MANIFEST_FORMAT: u32 = 1;

/// Metadata written alongside each persisted model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreManifest {
    pub format: u32,
    pub family: MetricsFamily,
    pub saved_at: DateTime<Utc>,
}

/// Owns a model's lifecycle: fit, validate, persist, erase, close
pub struct TrainSession<L: Learner> {
    learner: L,
    engine: Arc<dyn StorageEngine>,
    state: SessionState,
    params: Option<TrainingParameters>,
    model: Option<ModelParameters>,
    report: Option<CrossValidationReport>,
    saved_name: Option<String>,
    /// Cached handle on the saved name, released by `close`
    store: Option<Store>,
}

impl<L: Learner> TrainSession<L> {
    pub fn new(learner: L, engine: Arc<dyn StorageEngine>) -> Self {
        Self {
            learner,
            engine,
            state: SessionState::Untrained,
            params: None,
            model: None,
            report: None,
            saved_name: None,
            store: None,
        }
    }

    /// Restore a previously persisted session from `name`.
    ///
    /// A name with no model behind it is a not-found storage error. The
    /// stored family must match the learner's.
    pub fn load(learner: L, engine: Arc<dyn StorageEngine>, name: &str) -> Result<Self> {
        let store = engine.open(name)?;
        let model: ModelParameters = store
            .get_bin(KEY_MODEL)?
            .ok_or_else(|| KilnError::NotFound(name.to_string()))?;
        let params: TrainingParameters = store
            .get_bin(KEY_PARAMS)?
            .ok_or_else(|| KilnError::NotFound(name.to_string()))?;

        if let Some(manifest) = store.get_json::<StoreManifest>(KEY_MANIFEST)? {
            if manifest.family != learner.family() {
                return Err(KilnError::ValidationError(format!(
                    "stored model family {} does not match learner family {}",
                    manifest.family,
                    learner.family()
                )));
            }
        }

        info!(name, backend = engine.backend_name(), "model restored");
        Ok(Self {
            learner,
            engine,
            state: SessionState::Persisted,
            params: Some(params),
            model: Some(model),
            report: None,
            saved_name: Some(name.to_string()),
            store: Some(store),
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn learner(&self) -> &L {
        &self.learner
    }

    /// Report of the cross-validation run embedded in the last fit, if any
    pub fn validation_report(&self) -> Option<&CrossValidationReport> {
        self.report.as_ref()
    }

    /// Name this session's artifacts are persisted under, once saved
    pub fn storage_name(&self) -> Option<&str> {
        self.saved_name.as_deref()
    }

    /// Persist learned state under `db_name`.
    ///
    /// Valid once trained; re-saving overwrites. On storage failure the
    /// session keeps its state and previously persisted content stays
    /// visible.
    pub fn save(&mut self, db_name: &str) -> Result<()> {
        match self.state {
            SessionState::Trained | SessionState::Persisted => {}
            state => {
                return Err(KilnError::LifecycleError(format!(
                    "save is not valid in state {:?}",
                    state
                )))
            }
        }
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| KilnError::LifecycleError("no model to save".to_string()))?;
        let params = self
            .params
            .as_ref()
            .ok_or_else(|| KilnError::LifecycleError("no parameters to save".to_string()))?;

        let rebind = match &self.store {
            Some(store) => store.is_closed() || store.name() != db_name,
            None => true,
        };
        if rebind {
            if let Some(mut old) = self.store.take() {
                old.close()?;
            }
            self.store = Some(self.engine.open(db_name)?);
        }
        let store = self.store.as_mut().expect("store bound above");

        store.put_bin(KEY_MODEL, model)?;
        store.put_bin(KEY_PARAMS, params)?;
        store.put_json(
            KEY_MANIFEST,
            &StoreManifest {
                format: MANIFEST_FORMAT,
                family: self.learner.family(),
                saved_at: Utc::now(),
            },
        )?;
        store.save(db_name)?;

        self.saved_name = Some(db_name.to_string());
        self.state = SessionState::Persisted;
        info!(
            name = db_name,
            backend = self.engine.backend_name(),
            "model persisted"
        );
        Ok(())
    }
}

impl<L: Learner> std::fmt::Debug for TrainSession<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainSession")
            .field("state", &self.state)
            .field("saved_name", &self.saved_name)
            .finish()
    }
}

impl<L: Learner> Trainable for TrainSession<L> {
    /// Train on `dataset`, replacing any prior learned state.
    ///
    /// When `params.validation` is set, the configuration is
    /// cross-validated first and the report retained. A failure anywhere
    /// restores the previous state and model.
    fn fit(&mut self, dataset: &Dataset, params: TrainingParameters) -> Result<()> {
        match self.state {
            SessionState::Untrained | SessionState::Trained | SessionState::Persisted => {}
            SessionState::Fitting => {
                return Err(KilnError::LifecycleError(
                    "fit is already in progress".to_string(),
                ))
            }
            state => {
                return Err(KilnError::LifecycleError(format!(
                    "fit is not valid in state {:?}",
                    state
                )))
            }
        }
        if dataset.is_empty() {
            return Err(KilnError::DataError(
                "cannot fit on an empty dataset".to_string(),
            ));
        }

        let prior = self.state;
        if prior == SessionState::Persisted {
            warn!(
                name = self.saved_name.as_deref().unwrap_or(""),
                "re-fitting a persisted session; saved artifacts remain until erase or save"
            );
        }
        self.state = SessionState::Fitting;

        let outcome = (|| {
            let report = match &params.validation {
                Some(config) => Some(
                    CrossValidator::new(config.clone()).validate(&self.learner, dataset, &params)?,
                ),
                None => None,
            };
            let model = self.learner.fit(&dataset.full_view(), &params)?;
            Ok::<_, KilnError>((model, report))
        })();

        match outcome {
            Ok((model, report)) => {
                self.model = Some(model);
                self.params = Some(params);
                self.report = report;
                self.state = SessionState::Trained;
                info!(records = dataset.len(), "fit complete");
                Ok(())
            }
            Err(e) => {
                self.state = prior;
                Err(e)
            }
        }
    }

    fn model_parameters(&self) -> Result<&ModelParameters> {
        self.model.as_ref().ok_or_else(|| {
            KilnError::LifecycleError(
                "model parameters requested before the first fit".to_string(),
            )
        })
    }

    fn training_parameters(&self) -> Result<&TrainingParameters> {
        self.params.as_ref().ok_or_else(|| {
            KilnError::LifecycleError(
                "training parameters requested before the first fit".to_string(),
            )
        })
    }

    fn erase(&mut self) -> Result<()> {
        match self.state {
            SessionState::Trained | SessionState::Persisted => {}
            state => {
                return Err(KilnError::LifecycleError(format!(
                    "erase is not valid in state {:?}",
                    state
                )))
            }
        }

        if let Some(name) = self.saved_name.clone() {
            let store = match self.store.take() {
                Some(store) if !store.is_closed() && store.name() == name => store,
                other => {
                    if let Some(mut stale) = other {
                        stale.close()?;
                    }
                    self.engine.open(&name)?
                }
            };
            store.delete()?;
            info!(name = %name, "persisted artifacts erased");
        }
        self.state = SessionState::Erased;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut store) = self.store.take() {
            store.close()?;
        }
        if !matches!(self.state, SessionState::Erased | SessionState::Closed) {
            self.state = SessionState::Closed;
        }
        Ok(())
    }
}
