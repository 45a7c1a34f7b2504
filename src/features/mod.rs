//! Feature schema and the scaling transform shared by training and serving.

pub mod scaler;
pub mod schema;

pub use scaler::ScalingTransform;
pub use schema::{feature_matrix, FeatureVector, ScaledFeatures, FEATURE_COLUMNS, FEATURE_COUNT};
