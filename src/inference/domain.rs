//! Domain definitions for assessment requests, signal providers and results.

use serde::{Deserialize, Serialize};

use crate::common::error::ScreenResult;
use crate::data::domain::{check_anemia, AcuteClass, ChildRecord, Sex};
use crate::features::ScaledFeatures;
use crate::training::domain::Classifier;

/// The three independent screening signals.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Acute,
    Stunting,
    Anemia,
}

impl Signal {
    pub const ALL: [Signal; 3] = [Signal::Acute, Signal::Stunting, Signal::Anemia];

    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Acute => "acute",
            Signal::Stunting => "stunting",
            Signal::Anemia => "anemia",
        }
    }
}

/// Uniform interface over learned classifiers and deterministic rules.
pub trait SignalProvider: Send + Sync {
    fn signal(&self) -> Signal;

    /// Read one discrete label. Rule providers may ignore `scaled`.
    fn read(&self, scaled: &ScaledFeatures, raw: &ChildRecord) -> ScreenResult<usize>;

    /// Feature arity the provider consumes, `None` for rules on raw values.
    fn expected_features(&self) -> Option<usize>;
}

/// A trained classifier exposed as a signal.
pub struct ClassifierSignal {
    signal: Signal,
    model: Box<dyn Classifier>,
}

impl ClassifierSignal {
    // anemia is never model-backed, so only acute and stunting constructors are public
    fn new(signal: Signal, model: Box<dyn Classifier>) -> Self {
        Self { signal, model }
    }

    pub fn acute(model: impl Classifier + 'static) -> Self {
        Self::new(Signal::Acute, Box::new(model))
    }

    pub fn stunting(model: impl Classifier + 'static) -> Self {
        Self::new(Signal::Stunting, Box::new(model))
    }
}

impl SignalProvider for ClassifierSignal {
    fn signal(&self) -> Signal {
        self.signal
    }

    fn read(&self, scaled: &ScaledFeatures, _raw: &ChildRecord) -> ScreenResult<usize> {
        self.model.predict(scaled)
    }

    fn expected_features(&self) -> Option<usize> {
        Some(self.model.n_features())
    }
}

/// Hemoglobin threshold rule. Never learned.
#[derive(Copy, Clone, Debug, Default)]
pub struct AnemiaRule;

impl SignalProvider for AnemiaRule {
    fn signal(&self) -> Signal {
        Signal::Anemia
    }

    fn read(&self, _scaled: &ScaledFeatures, raw: &ChildRecord) -> ScreenResult<usize> {
        Ok(usize::from(check_anemia(raw.hb)))
    }

    fn expected_features(&self) -> Option<usize> {
        None
    }
}

/// The six scalars a caller supplies for one child.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssessmentInput {
    pub age: u32,
    pub sex: Sex,
    pub weight: f64,
    pub height: f64,
    pub muac: f64,
    pub hb: f64,
}

impl From<&AssessmentInput> for ChildRecord {
    fn from(input: &AssessmentInput) -> Self {
        ChildRecord {
            age: input.age,
            sex: input.sex,
            weight: input.weight,
            height: input.height,
            muac: input.muac,
            hb: input.hb,
        }
    }
}

/// Request-scoped outcome of one assessment.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AssessmentResult {
    pub acute_class: AcuteClass,
    pub acute_text: &'static str,
    pub stunting_flag: bool,
    pub anemia_flag: bool,
    pub bmi: f64,
    pub recommendations: Vec<String>,
}

impl AssessmentResult {
    /// SAM carries an explicit clinical-referral flag.
    pub fn needs_referral(&self) -> bool {
        self.acute_class == AcuteClass::Sam
    }
}
