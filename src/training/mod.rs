//! Training: parameter values, the learner contract and lifecycle sessions

mod params;
mod session;

pub use params::{ModelParameters, ParamValue, TrainingParameters};
pub use session::{Learner, SessionState, StoreManifest, TrainSession, Trainable};
