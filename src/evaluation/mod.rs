//! Held-out evaluation: stable train/test split and classification reports.

pub mod domain;
pub mod service;

pub use domain::{ClassMetrics, ClassificationReport};
pub use service::{classification_report, train_test_split};
