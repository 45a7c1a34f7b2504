//! Assessment orchestration: validate, derive, scale once, read every signal, compose advice.

use std::sync::{mpsc, Arc};
use std::time::Instant;

use crate::common::error::{ScreenError, ScreenResult};
use crate::common::time;
use crate::data::domain::{AcuteClass, ChildRecord};
use crate::features::{FeatureVector, ScalingTransform, FEATURE_COUNT};
use crate::training::domain::{Classifier, ModelRepo};

use super::domain::{
    AnemiaRule, AssessmentInput, AssessmentResult, ClassifierSignal, Signal, SignalProvider,
};
use super::recommend::{acute_text, build_recommendations};
use super::workers::Pool;

/// Serving-time engine. Immutable once built, safe to share across threads.
pub struct Assessor {
    scaler: ScalingTransform,
    providers: Vec<Box<dyn SignalProvider>>,
    version: Option<String>,
}

impl std::fmt::Debug for Assessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assessor")
            .field("signals", &self.signals())
            .field("version", &self.version)
            .finish()
    }
}

impl Assessor {
    /// Requires exactly one provider per [`Signal`] and classifiers on the fitted arity.
    pub fn new(
        scaler: ScalingTransform,
        mut providers: Vec<Box<dyn SignalProvider>>,
    ) -> ScreenResult<Self> {
        scaler.check_schema()?;

        for signal in Signal::ALL {
            match providers.iter().filter(|p| p.signal() == signal).count() {
                0 => {
                    return Err(ScreenError::not_ready(format!(
                        "no provider for the {} signal",
                        signal.as_str()
                    )))
                }
                1 => {}
                n => {
                    return Err(ScreenError::config(format!(
                        "{n} providers registered for the {} signal",
                        signal.as_str()
                    )))
                }
            }
        }
        for provider in &providers {
            if provider.signal() == Signal::Anemia && provider.expected_features().is_some() {
                return Err(ScreenError::config(
                    "the anemia signal must come from the hemoglobin rule, not a model",
                ));
            }
            if let Some(n) = provider.expected_features() {
                if n != FEATURE_COUNT {
                    return Err(ScreenError::schema(
                        format!("{FEATURE_COUNT} features for {}", provider.signal().as_str()),
                        n,
                    ));
                }
            }
        }
        providers.sort_by_key(|p| p.signal() as u8);

        Ok(Self {
            scaler,
            providers,
            version: None,
        })
    }

    /// Two trained classifiers plus the hemoglobin rule.
    pub fn from_models(
        scaler: ScalingTransform,
        acute: impl Classifier + 'static,
        stunting: impl Classifier + 'static,
    ) -> ScreenResult<Self> {
        let providers: Vec<Box<dyn SignalProvider>> = vec![
            Box::new(ClassifierSignal::acute(acute)),
            Box::new(ClassifierSignal::stunting(stunting)),
            Box::new(AnemiaRule),
        ];
        Self::new(scaler, providers)
    }

    /// Build from persisted artefacts; refuses to run when any is missing.
    pub fn load(repo: &dyn ModelRepo) -> ScreenResult<Self> {
        let artifacts = repo.get_artifacts()?;
        let version = artifacts.manifest.version.clone();
        let mut assessor = Self::from_models(artifacts.scaler, artifacts.acute, artifacts.stunting)?;
        tracing::info!(ev = "assessor_ready", version = %version);
        assessor.version = Some(version);
        Ok(assessor)
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn scaler(&self) -> &ScalingTransform {
        &self.scaler
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.providers.iter().map(|p| p.signal()).collect()
    }

    /// Assess one child. Input is validated before any model is consulted.
    pub fn assess(&self, input: &AssessmentInput) -> ScreenResult<AssessmentResult> {
        let start = Instant::now();
        if let Err(e) = validate(input) {
            tracing::warn!(ev = "assessment_rejected", error = %e);
            return Err(e);
        }

        let record = ChildRecord::from(input);
        let bmi = record.bmi();
        let scaled = self.scaler.transform(&FeatureVector::from_record(&record))?;

        let mut acute = AcuteClass::Normal;
        let mut stunting_flag = false;
        let mut anemia_flag = false;
        for provider in &self.providers {
            let label = provider.read(&scaled, &record)?;
            match provider.signal() {
                Signal::Acute => acute = AcuteClass::try_from(label)?,
                Signal::Stunting => stunting_flag = binary(Signal::Stunting, label)?,
                Signal::Anemia => anemia_flag = binary(Signal::Anemia, label)?,
            }
        }

        let result = AssessmentResult {
            acute_class: acute,
            acute_text: acute_text(acute),
            stunting_flag,
            anemia_flag,
            bmi,
            recommendations: build_recommendations(acute, stunting_flag, anemia_flag),
        };
        tracing::debug!(
            ev = "assessed",
            acute = acute.short_name(),
            stunting = stunting_flag,
            anemia = anemia_flag,
            dur_ms = time::elapsed_ms(start),
        );
        Ok(result)
    }
}

// `!(x > 0.0)` also rejects NaN
fn validate(input: &AssessmentInput) -> ScreenResult<()> {
    if !(input.height > 0.0) {
        return Err(ScreenError::invalid(format!(
            "height must be positive, got {}",
            input.height
        )));
    }
    if !(input.weight > 0.0) {
        return Err(ScreenError::invalid(format!(
            "weight must be positive, got {}",
            input.weight
        )));
    }
    Ok(())
}

fn binary(signal: Signal, label: usize) -> ScreenResult<bool> {
    match label {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(ScreenError::schema(
            format!("{} label in {{0,1}}", signal.as_str()),
            other,
        )),
    }
}

/// Assess many children on the pool. Results come back in input order.
pub fn batch_assess(
    assessor: Arc<Assessor>,
    inputs: Vec<AssessmentInput>,
    pool: &Pool,
) -> ScreenResult<Vec<ScreenResult<AssessmentResult>>> {
    let start = Instant::now();
    let n = inputs.len();
    let (tx, rx) = mpsc::channel();

    for (idx, input) in inputs.into_iter().enumerate() {
        let tx = tx.clone();
        let assessor = Arc::clone(&assessor);
        pool.submit(move || {
            let _ = tx.send((idx, assessor.assess(&input)));
        })?;
    }
    drop(tx);

    let mut slots: Vec<Option<ScreenResult<AssessmentResult>>> = (0..n).map(|_| None).collect();
    for (idx, result) in rx.iter() {
        slots[idx] = Some(result);
    }

    let results = slots
        .into_iter()
        .enumerate()
        .map(|(idx, slot)| {
            slot.ok_or_else(|| ScreenError::internal(format!("assessment {idx} was lost")))
        })
        .collect::<ScreenResult<Vec<_>>>()?;

    tracing::info!(ev = "batch_assessed", n, dur_ms = time::elapsed_ms(start));
    Ok(results)
}
