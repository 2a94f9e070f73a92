//! Error types for rule descriptions and model persistence.
//!
//! Every fallible operation in this crate returns [`Result<T>`], whose error
//! type [`FormatError`] carries a stable machine-readable code (see
//! [`FormatError::error_code`]) next to the human-readable message.
//!
//! Errors serialize as `{"code": ..., "message": ...}` so that they can be
//! forwarded verbatim to review tooling.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for describing and persisting formatting rules.
#[derive(Error, Debug)]
pub enum FormatError {
    /// The feature extractor has no feature metadata yet.
    #[error("Feature extractor is not fitted")]
    NotFitted,

    /// Input failed validation (e.g. a virtual node without labels).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A rule references a flat feature index the extractor does not know.
    #[error("Unknown feature index {0}")]
    UnknownFeatureIndex(usize),

    /// The extractor has no feature registered under the given location.
    #[error("Unknown feature '{0}'")]
    UnknownFeature(String),

    /// A class label outside of the extractor's label table.
    #[error("Unknown class label {0}")]
    UnknownLabel(usize),

    /// A class sequence that does not correspond to any label.
    #[error("Unknown class sequence {0:?}")]
    UnknownClassSequence(Vec<usize>),

    /// A requested code line does not exist.
    #[error("Line {line} is out of range (the code has {len} lines)")]
    LineOutOfRange { line: usize, len: usize },

    /// The model has no rules for the requested language.
    #[error("No rules for language '{0}'")]
    LanguageNotFound(String),

    /// A persisted model tree is inconsistent.
    #[error("Corrupt model tree: {0}")]
    CorruptTree(String),

    /// The model file does not exist.
    #[error("Model not found: {path}")]
    ModelNotFound { path: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<FormatError>,
    },
}

impl FormatError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        FormatError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get the stable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFitted => "NOT_FITTED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::UnknownFeatureIndex(_) => "UNKNOWN_FEATURE_INDEX",
            Self::UnknownFeature(_) => "UNKNOWN_FEATURE",
            Self::UnknownLabel(_) => "UNKNOWN_LABEL",
            Self::UnknownClassSequence(_) => "UNKNOWN_CLASS_SEQUENCE",
            Self::LineOutOfRange { .. } => "LINE_OUT_OF_RANGE",
            Self::LanguageNotFound(_) => "LANGUAGE_NOT_FOUND",
            Self::CorruptTree(_) => "CORRUPT_TREE",
            Self::ModelNotFound { .. } => "MODEL_NOT_FOUND",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error means the feature extractor must be fitted first.
    pub fn is_not_fitted(&self) -> bool {
        match self {
            Self::NotFitted => true,
            Self::WithContext { source, .. } => source.is_not_fitted(),
            _ => false,
        }
    }
}

impl Serialize for FormatError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("FormatError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, FormatError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| FormatError::Io(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(FormatError::NotFitted.error_code(), "NOT_FITTED");
        assert_eq!(
            FormatError::LineOutOfRange { line: 4, len: 2 }.error_code(),
            "LINE_OUT_OF_RANGE"
        );
    }

    #[test]
    fn test_is_not_fitted() {
        assert!(FormatError::NotFitted.is_not_fitted());
        assert!(FormatError::NotFitted.with_context("describing").is_not_fitted());
        assert!(!FormatError::UnknownLabel(3).is_not_fitted());
    }

    #[test]
    fn test_error_serialization() {
        let error = FormatError::LanguageNotFound("go".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("LANGUAGE_NOT_FOUND"));
        assert!(json.contains("go"));
    }

    #[test]
    fn test_with_context() {
        let error = FormatError::UnknownFeatureIndex(12).with_context("While describing rule 3");
        assert!(error.to_string().contains("While describing rule 3"));
        assert_eq!(error.error_code(), "UNKNOWN_FEATURE_INDEX");
    }
}
