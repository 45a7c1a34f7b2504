//! Fit-once standardisation of the feature vector.

use serde::{Deserialize, Serialize};

use crate::common::error::{ScreenError, ScreenResult};

use super::schema::{FeatureVector, ScaledFeatures, FEATURE_COLUMNS, FEATURE_COUNT};

/// Per-column mean/std captured from the training matrix. Immutable once fit;
/// serving must reuse the persisted instance, never refit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScalingTransform {
    columns: Vec<String>,
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl ScalingTransform {
    /// Population mean/std per column. Zero rows cannot be fit.
    pub fn fit(rows: &[FeatureVector]) -> ScreenResult<Self> {
        if rows.is_empty() {
            return Err(ScreenError::degenerate("cannot fit scaler on zero rows"));
        }
        let n = rows.len() as f64;

        let mut mean = vec![0.0; FEATURE_COUNT];
        for row in rows {
            for (m, v) in mean.iter_mut().zip(row.as_slice()) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut std = vec![0.0; FEATURE_COUNT];
        for row in rows {
            for ((s, v), m) in std.iter_mut().zip(row.as_slice()).zip(&mean) {
                let d = v - m;
                *s += d * d;
            }
        }
        for (s, m) in std.iter_mut().zip(&mean) {
            *s = (*s / n).sqrt();
            if is_negligible(*s, *m) {
                *s = 0.0;
            }
        }

        Ok(Self {
            columns: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            mean,
            std,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn std(&self) -> &[f64] {
        &self.std
    }

    /// Verify the fitted columns are exactly the process-wide schema.
    /// Guards against persisted transforms from a different column layout.
    pub fn check_schema(&self) -> ScreenResult<()> {
        let same_order = self.columns.iter().map(String::as_str).eq(FEATURE_COLUMNS);
        if !same_order || self.mean.len() != FEATURE_COUNT || self.std.len() != FEATURE_COUNT {
            return Err(ScreenError::schema(
                FEATURE_COLUMNS.join(","),
                format!(
                    "{} (mean {}, std {})",
                    self.columns.join(","),
                    self.mean.len(),
                    self.std.len()
                ),
            ));
        }
        Ok(())
    }

    pub fn transform(&self, features: &FeatureVector) -> ScreenResult<ScaledFeatures> {
        self.transform_row(features.as_slice())
    }

    /// Standardise one raw row assumed to be in fitted column order.
    /// Columns with zero spread are only centred.
    pub fn transform_row(&self, row: &[f64]) -> ScreenResult<ScaledFeatures> {
        self.check_schema()?;
        if row.len() != self.mean.len() {
            return Err(ScreenError::schema(self.mean.len(), row.len()));
        }
        let scaled = row
            .iter()
            .zip(self.mean.iter().zip(&self.std))
            .map(|(v, (m, s))| if is_negligible(*s, *m) { v - m } else { (v - m) / s })
            .collect();
        Ok(ScaledFeatures::new(scaled))
    }

    pub fn transform_all(&self, rows: &[FeatureVector]) -> ScreenResult<Vec<ScaledFeatures>> {
        rows.iter().map(|r| self.transform(r)).collect()
    }
}

/// Spread at rounding-noise level relative to the column magnitude counts as zero.
fn is_negligible(std: f64, mean: f64) -> bool {
    !(std > f64::EPSILON * mean.abs().max(1.0))
}
