//! The fixed feature contract shared by training and serving.
//!
//! Column order is load-bearing: scaler statistics and tree split indices are
//! positional, so a reordered vector is scored as a different child without
//! any numeric error surfacing.

use crate::common::error::{ScreenError, ScreenResult};
use crate::data::domain::{ChildRecord, LabeledRecord};

pub const FEATURE_COUNT: usize = 7;

/// Process-wide column order.
pub const FEATURE_COLUMNS: [&str; FEATURE_COUNT] =
    ["age", "sex", "weight", "height", "muac", "hb", "bmi"];

/// Raw, unscaled features in [`FEATURE_COLUMNS`] order.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    /// The only derivation path used at training and serving time.
    pub fn from_record(record: &ChildRecord) -> Self {
        Self([
            f64::from(record.age),
            f64::from(record.sex.code()),
            record.weight,
            record.height,
            record.muac,
            record.hb,
            record.bmi(),
        ])
    }

    /// Wrap an already-ordered slice; wrong arity is a contract violation.
    pub fn try_from_slice(values: &[f64]) -> ScreenResult<Self> {
        let arr: [f64; FEATURE_COUNT] = values
            .try_into()
            .map_err(|_| ScreenError::schema(FEATURE_COUNT, values.len()))?;
        Ok(Self(arr))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Value of a named column.
    pub fn column(&self, name: &str) -> Option<f64> {
        FEATURE_COLUMNS
            .iter()
            .position(|c| *c == name)
            .map(|idx| self.0[idx])
    }
}

/// Standardised features. Produced by [`super::ScalingTransform`]; classifiers only accept this type.
#[derive(Clone, Debug, PartialEq)]
pub struct ScaledFeatures(Vec<f64>);

impl ScaledFeatures {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Feature matrix for a cohort, row order preserved.
pub fn feature_matrix(cohort: &[LabeledRecord]) -> Vec<FeatureVector> {
    cohort
        .iter()
        .map(|r| FeatureVector::from_record(&r.record))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::domain::Sex;

    fn child() -> ChildRecord {
        ChildRecord {
            age: 24,
            sex: Sex::Male,
            weight: 12.0,
            height: 85.0,
            muac: 130.0,
            hb: 11.5,
        }
    }

    #[test]
    fn vector_follows_column_order() {
        let v = FeatureVector::from_record(&child());
        let s = v.as_slice();
        assert_eq!(&s[..6], &[24.0, 1.0, 12.0, 85.0, 130.0, 11.5]);
        assert_eq!(s[6], child().bmi());
        assert_eq!(v.column("muac"), Some(130.0));
        assert_eq!(v.column("zscore"), None);
    }

    #[test]
    fn bmi_tracks_weight_changes() {
        let mut c = child();
        let before = FeatureVector::from_record(&c).column("bmi").unwrap();
        c.weight = 10.0;
        let after = FeatureVector::from_record(&c).column("bmi").unwrap();
        assert!(after < before);
        assert_eq!(after, c.bmi());
    }

    #[test]
    fn wrong_arity_fails_fast() {
        let err = FeatureVector::try_from_slice(&[1.0; 6]).unwrap_err();
        assert!(matches!(err, ScreenError::SchemaMismatch { .. }));
        assert!(FeatureVector::try_from_slice(&[1.0; 7]).is_ok());
    }
}
