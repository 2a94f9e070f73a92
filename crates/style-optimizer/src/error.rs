//! Error types for the style-optimizer crate.
//!
//! [`OptimizerError`] is returned by every fallible operation. Like the rest
//! of the workspace, errors carry a stable code and serialize as
//! `{"code": ..., "message": ...}`.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OptimizerError {
    /// Invalid optimizer configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Training data that cannot be used for the search.
    ///
    /// Common causes:
    /// - feature matrix and label vector have different lengths
    /// - every class has fewer samples than there are folds
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A base model name outside of the search space.
    #[error("Unknown base model '{0}'")]
    UnknownBaseModel(String),

    /// A parameter name outside of the search space.
    #[error("Unknown parameter '{0}'")]
    UnknownParameter(String),

    /// A base model failed to fit or predict.
    #[error("Model error: {0}")]
    Model(String),

    /// The hyper-parameter study failed.
    #[error("Search error: {0}")]
    Search(#[from] optimizer::Error),

    /// The worker pool could not be created.
    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<OptimizerError>,
    },
}

impl OptimizerError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        OptimizerError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get the stable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InvalidData(_) => "INVALID_DATA",
            Self::UnknownBaseModel(_) => "UNKNOWN_BASE_MODEL",
            Self::UnknownParameter(_) => "UNKNOWN_PARAMETER",
            Self::Model(_) => "MODEL_ERROR",
            Self::Search(_) => "SEARCH_ERROR",
            Self::ThreadPool(_) => "THREAD_POOL_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }
}

impl From<rayon::ThreadPoolBuildError> for OptimizerError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        OptimizerError::ThreadPool(err.to_string())
    }
}

impl Serialize for OptimizerError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("OptimizerError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, OptimizerError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}
