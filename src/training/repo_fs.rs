//! Filesystem repository for the scaler, both classifiers and the manifest.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::common::config::AppCfg;
use crate::common::error::{ScreenError, ScreenResult};
use crate::features::ScalingTransform;

use super::domain::{Manifest, ModelKind, ModelRepo, TrainedArtifacts};
use super::forest::RandomForestClassifier;

pub const SCALER_FILE: &str = "scaler.json";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Persist artefacts as JSON under `<data_root>/models`.
pub struct FsModelRepo {
    root: PathBuf,
}

impl FsModelRepo {
    pub fn new(cfg: &AppCfg) -> Self {
        Self::at(Path::new(&cfg.data_root).join("models"))
    }

    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scaler_path(&self) -> PathBuf {
        self.root.join(SCALER_FILE)
    }

    pub fn model_path(&self, kind: ModelKind) -> PathBuf {
        self.root.join(kind.file_name())
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    fn required_paths(&self) -> [PathBuf; 4] {
        [
            self.model_path(ModelKind::Acute),
            self.model_path(ModelKind::Stunting),
            self.scaler_path(),
            self.manifest_path(),
        ]
    }

    // write-then-rename so a reader never sees a half-written artefact
    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> ScreenResult<()> {
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(value)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(path: &Path) -> ScreenResult<T> {
        let bytes = fs::read(path)
            .map_err(|e| ScreenError::not_ready(format!("{}: {e}", path.display())))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ScreenError::not_ready(format!("{}: {e}", path.display())))
    }
}

impl ModelRepo for FsModelRepo {
    fn put_artifacts(&self, artifacts: &TrainedArtifacts) -> ScreenResult<()> {
        fs::create_dir_all(&self.root)?;
        self.write_json(&self.scaler_path(), &artifacts.scaler)?;
        self.write_json(&self.model_path(ModelKind::Acute), &artifacts.acute)?;
        self.write_json(&self.model_path(ModelKind::Stunting), &artifacts.stunting)?;
        // manifest last: its presence marks a complete set
        self.write_json(&self.manifest_path(), &artifacts.manifest)?;
        tracing::info!(
            ev = "artifacts_saved",
            root = %self.root.display(),
            version = %artifacts.manifest.version,
        );
        Ok(())
    }

    /// Every absent file is reported in one error.
    fn get_artifacts(&self) -> ScreenResult<TrainedArtifacts> {
        let missing: Vec<String> = self
            .required_paths()
            .iter()
            .filter(|p| !p.exists())
            .map(|p| p.display().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ScreenError::not_ready(format!(
                "missing files:\n{}",
                missing.join("\n")
            )));
        }

        let scaler: ScalingTransform = Self::read_json(&self.scaler_path())?;
        scaler.check_schema()?;
        let acute: RandomForestClassifier = Self::read_json(&self.model_path(ModelKind::Acute))?;
        let stunting: RandomForestClassifier =
            Self::read_json(&self.model_path(ModelKind::Stunting))?;
        let manifest: Manifest = Self::read_json(&self.manifest_path())?;

        tracing::debug!(ev = "artifacts_loaded", root = %self.root.display(), version = %manifest.version);
        Ok(TrainedArtifacts {
            scaler,
            acute,
            stunting,
            manifest,
        })
    }
}
