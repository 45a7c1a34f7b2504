//! Data domain: child records, the synthetic cohort generator and cohort persistence.

pub mod domain;
pub mod repo_fs;
pub mod service;

pub use domain::{AcuteClass, ChildRecord, LabeledRecord, Labels, Sex};
pub use service::CohortGenerator;
