//! Child malnutrition screening core.
//!
//! Generates a labeled synthetic cohort, fits one scaling transform and two
//! classifiers on it, then assesses children by combining both classifiers
//! with a deterministic anemia rule into an ordered recommendation list.
pub mod common;
pub mod data;
pub mod features;
pub mod training;
pub mod inference;
pub mod evaluation;
pub mod api;

pub use common::{ScreenCode, ScreenError, ScreenResult};
pub use inference::{batch_assess, AssessmentInput, AssessmentResult, Assessor, Pool};
pub use training::service::run_pipeline;
