//! Error handling primitives shared across the core.

use thiserror::Error;

/// Stable error codes that cross the FFI boundary.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ScreenCode {
    /// Success code used as a sentinel.
    Ok = 0,
    /// Assessment input failed validation.
    Validation = 1,
    /// Feature vector arity/order does not match the fitted schema.
    SchemaMismatch = 2,
    /// Scaler or classifier artefact is absent or unloadable.
    MissingArtifact = 3,
    /// Training data was empty or had a single class.
    DegenerateTraining = 4,
    /// Configuration could not be loaded or is out of range.
    Config = 5,
    /// Catch-all for IO and serialisation failures.
    Internal = 6,
}

/// Canonical error type for the core.
#[derive(Error, Debug)]
pub enum ScreenError {
    /// Non-positive height or weight reached `assess`.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Programming-contract violation on the feature schema.
    #[error("feature schema mismatch: expected {expected}, got {actual}")]
    SchemaMismatch { expected: String, actual: String },

    /// Serving-time artefacts are not ready.
    #[error("artifact not ready: {0}")]
    MissingArtifact(String),

    #[error("degenerate training data: {0}")]
    DegenerateTraining(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Worker pool or FFI plumbing failure.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias used throughout the crate.
pub type ScreenResult<T> = Result<T, ScreenError>;

impl ScreenError {
    /// Validation helper.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Schema helper.
    pub fn schema(expected: impl ToString, actual: impl ToString) -> Self {
        Self::SchemaMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Missing artefact helper.
    pub fn not_ready(msg: impl Into<String>) -> Self {
        Self::MissingArtifact(msg.into())
    }

    /// Degenerate training helper.
    pub fn degenerate(msg: impl Into<String>) -> Self {
        Self::DegenerateTraining(msg.into())
    }

    /// Configuration helper.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Machine parsable code for this error.
    pub fn code(&self) -> ScreenCode {
        match self {
            Self::Validation(_) => ScreenCode::Validation,
            Self::SchemaMismatch { .. } => ScreenCode::SchemaMismatch,
            Self::MissingArtifact(_) => ScreenCode::MissingArtifact,
            Self::DegenerateTraining(_) => ScreenCode::DegenerateTraining,
            Self::Config(_) => ScreenCode::Config,
            Self::Io(_) | Self::Serialization(_) | Self::Csv(_) | Self::Internal(_) => {
                ScreenCode::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ScreenCode::Ok as u32, 0);
        assert_eq!(ScreenCode::Validation as u32, 1);
        assert_eq!(ScreenCode::SchemaMismatch as u32, 2);
        assert_eq!(ScreenCode::MissingArtifact as u32, 3);
        assert_eq!(ScreenCode::DegenerateTraining as u32, 4);
        assert_eq!(ScreenCode::Config as u32, 5);
        assert_eq!(ScreenCode::Internal as u32, 6);
    }

    #[test]
    fn errors_map_to_codes() {
        assert_eq!(ScreenError::invalid("w").code(), ScreenCode::Validation);
        assert_eq!(ScreenError::schema(7, 6).code(), ScreenCode::SchemaMismatch);
        assert_eq!(ScreenError::not_ready("x").code(), ScreenCode::MissingArtifact);
        assert_eq!(ScreenError::degenerate("x").code(), ScreenCode::DegenerateTraining);
        let io = ScreenError::from(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        assert_eq!(io.code(), ScreenCode::Internal);
        assert_eq!(ScreenError::internal("pool").code(), ScreenCode::Internal);
    }

    #[test]
    fn schema_message_names_both_sides() {
        let err = ScreenError::schema(7, 5);
        let msg = err.to_string();
        assert!(msg.contains('7'));
        assert!(msg.contains('5'));
    }
}
