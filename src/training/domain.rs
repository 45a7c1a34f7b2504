//! Domain types for model training and artefact versioning.

use serde::{Deserialize, Serialize};

use crate::common::error::ScreenResult;
use crate::data::domain::AcuteClass;
use crate::evaluation::domain::ClassificationReport;
use crate::features::{ScaledFeatures, ScalingTransform};

use super::forest::RandomForestClassifier;

/// Capability every trained model exposes at serving time.
pub trait Classifier: Send + Sync {
    /// Predict a discrete label for one scaled row.
    fn predict(&self, x: &ScaledFeatures) -> ScreenResult<usize>;

    /// Arity the model was trained on.
    fn n_features(&self) -> usize;

    /// Distinct labels seen during training, ascending.
    fn classes(&self) -> &[usize];

    fn predict_all(&self, rows: &[ScaledFeatures]) -> ScreenResult<Vec<usize>> {
        rows.iter().map(|r| self.predict(r)).collect()
    }
}

/// Interface for components that can perform training.
pub trait Trainer {
    type Model: Classifier;

    fn train(&self, x: &[ScaledFeatures], y: &[usize]) -> ScreenResult<Self::Model>;
}

/// The two independently trained models.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Acute,
    Stunting,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Acute => "acute",
            ModelKind::Stunting => "stunting",
        }
    }

    /// Artefact file name inside the model directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            ModelKind::Acute => "acute_model.json",
            ModelKind::Stunting => "stunting_model.json",
        }
    }

    /// `(label, name)` pairs for evaluation reports.
    pub fn class_names(&self) -> Vec<(usize, &'static str)> {
        match self {
            ModelKind::Acute => AcuteClass::ALL
                .iter()
                .map(|c| (c.label(), c.short_name()))
                .collect(),
            ModelKind::Stunting => vec![(0, "not stunted"), (1, "stunted")],
        }
    }
}

/// Metadata written next to the artefacts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub created_ms: u128,
    /// Fingerprint of the cohort CSV the models were trained on.
    pub cohort_fingerprint: String,
    pub train_rows: usize,
    pub test_rows: usize,
    pub acute_report: ClassificationReport,
    pub stunting_report: ClassificationReport,
}

/// Everything serving needs, produced together by one training run.
#[derive(Clone, Debug)]
pub struct TrainedArtifacts {
    pub scaler: ScalingTransform,
    pub acute: RandomForestClassifier,
    pub stunting: RandomForestClassifier,
    pub manifest: Manifest,
}

/// Repository contract for model artefacts.
pub trait ModelRepo {
    fn put_artifacts(&self, artifacts: &TrainedArtifacts) -> ScreenResult<()>;
    fn get_artifacts(&self) -> ScreenResult<TrainedArtifacts>;
}
