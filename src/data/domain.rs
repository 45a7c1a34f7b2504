//! Child records, labels and the clinical thresholds shared by generation and serving.

use serde::{Deserialize, Serialize};

use crate::common::error::{ScreenError, ScreenResult};

/// MUAC below this (mm) is severe acute malnutrition.
pub const MUAC_SAM_MM: f64 = 110.0;
/// MUAC below this (mm) and at or above [`MUAC_SAM_MM`] is moderate acute malnutrition.
pub const MUAC_MAM_MM: f64 = 125.0;
/// Observed/expected height ratio below which a child is stunted.
pub const STUNTING_HEIGHT_RATIO: f64 = 0.85;
/// Hemoglobin below this is anemic.
pub const ANEMIA_HB: f64 = 11.0;

/// Youngest age (months) produced by the generator.
pub const MIN_AGE_MONTHS: u32 = 6;
/// Oldest age (months) produced by the generator.
pub const MAX_AGE_MONTHS: u32 = 59;

/// Linear growth curve: 65 cm at 6 months, +0.9 cm per month.
pub fn expected_height(age_months: u32) -> f64 {
    65.0 + (f64::from(age_months) - 6.0) * 0.9
}

/// Linear growth curve: 7 kg at 6 months, +0.2 kg per month.
pub fn expected_weight(age_months: u32) -> f64 {
    7.0 + (f64::from(age_months) - 6.0) * 0.2
}

/// Body mass index from kg and cm.
pub fn bmi(weight_kg: f64, height_cm: f64) -> f64 {
    let metres = height_cm / 100.0;
    weight_kg / (metres * metres)
}

/// Deterministic anemia rule. Never learned, never taken from a noisy label.
pub fn check_anemia(hb: f64) -> bool {
    hb < ANEMIA_HB
}

/// Noise-free acute rule on MUAC.
pub fn acute_rule(muac_mm: f64) -> AcuteClass {
    if muac_mm < MUAC_SAM_MM {
        AcuteClass::Sam
    } else if muac_mm < MUAC_MAM_MM {
        AcuteClass::Mam
    } else {
        AcuteClass::Normal
    }
}

/// Noise-free stunting rule on height-for-age.
pub fn stunting_rule(age_months: u32, height_cm: f64) -> bool {
    height_cm / expected_height(age_months) < STUNTING_HEIGHT_RATIO
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Sex {
    Female = 0,
    Male = 1,
}

impl Sex {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<Sex> for u8 {
    fn from(value: Sex) -> Self {
        value.code()
    }
}

impl TryFrom<u8> for Sex {
    type Error = ScreenError;

    fn try_from(value: u8) -> ScreenResult<Self> {
        match value {
            0 => Ok(Sex::Female),
            1 => Ok(Sex::Male),
            other => Err(ScreenError::schema("sex in {0,1}", other)),
        }
    }
}

/// Acute malnutrition severity, ordinal.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum AcuteClass {
    Normal = 0,
    Mam = 1,
    Sam = 2,
}

impl AcuteClass {
    pub const ALL: [AcuteClass; 3] = [AcuteClass::Normal, AcuteClass::Mam, AcuteClass::Sam];

    pub fn label(self) -> usize {
        self as usize
    }

    /// Display text used in assessment results.
    pub fn text(self) -> &'static str {
        match self {
            AcuteClass::Normal => "Normal",
            AcuteClass::Mam => "Moderate Acute Malnutrition (MAM)",
            AcuteClass::Sam => "Severe Acute Malnutrition (SAM)",
        }
    }

    /// Short name used as a report row header.
    pub fn short_name(self) -> &'static str {
        match self {
            AcuteClass::Normal => "Normal",
            AcuteClass::Mam => "MAM",
            AcuteClass::Sam => "SAM",
        }
    }
}

impl TryFrom<usize> for AcuteClass {
    type Error = ScreenError;

    fn try_from(value: usize) -> ScreenResult<Self> {
        AcuteClass::ALL
            .get(value)
            .copied()
            .ok_or_else(|| ScreenError::schema("acute label in {0,1,2}", value))
    }
}

impl From<AcuteClass> for u8 {
    fn from(value: AcuteClass) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for AcuteClass {
    type Error = ScreenError;

    fn try_from(value: u8) -> ScreenResult<Self> {
        AcuteClass::try_from(usize::from(value))
    }
}

/// One anthropometric observation. `bmi` is derived on demand, never stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChildRecord {
    /// Months.
    pub age: u32,
    pub sex: Sex,
    /// Kilograms.
    pub weight: f64,
    /// Centimetres.
    pub height: f64,
    /// Mid-upper-arm circumference, millimetres.
    pub muac: f64,
    /// Hemoglobin.
    pub hb: f64,
}

impl ChildRecord {
    pub fn bmi(&self) -> f64 {
        bmi(self.weight, self.height)
    }

    /// Height relative to the age-expected height.
    pub fn height_for_age(&self) -> f64 {
        self.height / expected_height(self.age)
    }
}

/// Training-time labels attached to a generated record.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Labels {
    pub acute: AcuteClass,
    pub stunting: bool,
    /// Reference only; serving always recomputes via [`check_anemia`].
    pub anemia: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LabeledRecord {
    pub record: ChildRecord,
    pub labels: Labels,
}

/// Repository contract for cohort persistence.
pub trait CohortRepo {
    fn put_cohort(&self, cohort: &[LabeledRecord]) -> ScreenResult<()>;
    fn get_cohort(&self) -> ScreenResult<Vec<LabeledRecord>>;
}
