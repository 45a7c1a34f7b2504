//! Training domain: scaler fitting, classifier training and artefact lifecycle.

pub mod domain;
pub mod forest;
pub mod repo_fs;
pub mod service;

pub use domain::{Classifier, Manifest, ModelKind, ModelRepo, TrainedArtifacts, Trainer};
pub use forest::{ForestParams, ForestTrainer, RandomForestClassifier};
pub use repo_fs::FsModelRepo;
