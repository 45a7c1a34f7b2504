//! Runtime configuration: defaults, an optional TOML file, then environment overrides.

use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::common::error::{ScreenError, ScreenResult};

/// Environment variable naming an optional TOML config file.
pub const CONFIG_ENV: &str = "NUTRI_CONFIG";

/// Snapshot of configuration values consumed by the core.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppCfg {
    pub data_root: String,
    pub log_filter: String,
    /// Seed for cohort generation; `None` draws from entropy.
    pub seed: Option<u64>,
    pub generator: GeneratorCfg,
    pub training: TrainingCfg,
    /// Worker threads used for batch assessment.
    pub workers: usize,
}

/// Cohort generator knobs.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneratorCfg {
    pub cohort_size: usize,
    /// Probability of replacing/flipping a label (applied per label).
    pub noise_rate: f64,
}

/// Split and forest hyper-parameters.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainingCfg {
    pub test_fraction: f64,
    pub split_seed: u64,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub forest_seed: u64,
}

impl Default for AppCfg {
    fn default() -> Self {
        Self {
            data_root: "./data".to_string(),
            log_filter: "info".to_string(),
            seed: None,
            generator: GeneratorCfg::default(),
            training: TrainingCfg::default(),
            workers: 4,
        }
    }
}

impl Default for GeneratorCfg {
    fn default() -> Self {
        Self {
            cohort_size: 5000,
            noise_rate: 0.05,
        }
    }
}

impl Default for TrainingCfg {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            split_seed: 42,
            n_estimators: 200,
            max_depth: Some(16),
            min_samples_split: 2,
            forest_seed: 42,
        }
    }
}

impl AppCfg {
    /// Build a configuration snapshot from defaults, `NUTRI_CONFIG` and the process environment.
    pub fn load() -> ScreenResult<Self> {
        let base = match env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        let cfg = base.with_env_overrides(|key| env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML file; missing keys fall back to defaults.
    pub fn from_file(path: impl AsRef<Path>) -> ScreenResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| ScreenError::config(format!("read {}: {e}", path.display())))?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> ScreenResult<Self> {
        toml::from_str(raw).map_err(|e| ScreenError::config(format!("parse config: {e}")))
    }

    /// Apply `NUTRI_*` overrides through the provided lookup.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> ScreenResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(key: &str, raw: String) -> ScreenResult<T> {
            raw.trim()
                .parse()
                .map_err(|_| ScreenError::config(format!("{key}: cannot parse {raw:?}")))
        }

        if let Some(v) = lookup("NUTRI_DATA_ROOT") {
            self.data_root = v;
        }
        if let Some(v) = lookup("NUTRI_LOG") {
            self.log_filter = v;
        }
        if let Some(v) = lookup("NUTRI_SEED") {
            self.seed = Some(parsed("NUTRI_SEED", v)?);
        }
        if let Some(v) = lookup("NUTRI_COHORT_SIZE") {
            self.generator.cohort_size = parsed("NUTRI_COHORT_SIZE", v)?;
        }
        if let Some(v) = lookup("NUTRI_NOISE_RATE") {
            self.generator.noise_rate = parsed("NUTRI_NOISE_RATE", v)?;
        }
        Ok(self)
    }

    /// Reject values that would make generation or training meaningless.
    pub fn validate(&self) -> ScreenResult<()> {
        let g = &self.generator;
        let t = &self.training;
        if g.cohort_size == 0 {
            return Err(ScreenError::config("cohort_size must be at least 1"));
        }
        if !(0.0..=1.0).contains(&g.noise_rate) {
            return Err(ScreenError::config(format!(
                "noise_rate {} outside [0, 1]",
                g.noise_rate
            )));
        }
        if !(t.test_fraction > 0.0 && t.test_fraction < 1.0) {
            return Err(ScreenError::config(format!(
                "test_fraction {} outside (0, 1)",
                t.test_fraction
            )));
        }
        if t.n_estimators == 0 {
            return Err(ScreenError::config("n_estimators must be at least 1"));
        }
        if self.workers == 0 {
            return Err(ScreenError::config("workers must be at least 1"));
        }
        Ok(())
    }
}
