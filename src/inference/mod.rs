//! Inference domain: signal providers, recommendation policy and the assessment engine.

pub mod domain;
pub mod recommend;
pub mod service;
pub mod workers;

pub use domain::{
    AnemiaRule, AssessmentInput, AssessmentResult, ClassifierSignal, Signal, SignalProvider,
};
pub use recommend::{acute_text, build_recommendations};
pub use service::{batch_assess, Assessor};
pub use workers::Pool;
