//! Configuration for the hyper-parameter search.
//!
//! # Example
//!
//! ```
//! use style_optimizer::OptimizerConfig;
//!
//! let config = OptimizerConfig::builder()
//!     .cv_folds(5)
//!     .n_iter(30)
//!     .n_jobs(4)
//!     .build()
//!     .expect("valid config");
//! ```

use crate::error::{OptimizerError, Result};
use serde::{Deserialize, Serialize};

/// Settings of one [`Optimizer`](crate::Optimizer).
///
/// # Validation
///
/// [`build()`](OptimizerConfigBuilder::build) checks that:
/// - `cv_folds` is at least 2
/// - `n_iter` is at least 1
/// - `n_jobs`, when set, is at least 1
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Number of stratified cross-validation folds (default: 3).
    pub cv_folds: usize,

    /// Number of objective evaluations (default: 50).
    ///
    /// Values below 10 are raised to 10 by the optimizer.
    pub n_iter: usize,

    /// Worker threads for cross-validation folds (default: all cores).
    pub n_jobs: Option<usize>,

    /// Seed for every random choice of the search (default: 42).
    pub random_state: u64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            cv_folds: 3,
            n_iter: 50,
            n_jobs: None,
            random_state: 42,
        }
    }
}

impl OptimizerConfig {
    #[must_use]
    pub fn builder() -> OptimizerConfigBuilder {
        OptimizerConfigBuilder::default()
    }
}

/// Builder for [`OptimizerConfig`].
#[derive(Debug, Clone, Default)]
pub struct OptimizerConfigBuilder {
    config: OptimizerConfig,
}

impl OptimizerConfigBuilder {
    /// Set the number of cross-validation folds (default: 3).
    #[must_use]
    pub fn cv_folds(mut self, folds: usize) -> Self {
        self.config.cv_folds = folds;
        self
    }

    /// Set the number of objective evaluations (default: 50).
    #[must_use]
    pub fn n_iter(mut self, n_iter: usize) -> Self {
        self.config.n_iter = n_iter;
        self
    }

    /// Limit the number of worker threads.
    #[must_use]
    pub fn n_jobs(mut self, jobs: usize) -> Self {
        self.config.n_jobs = Some(jobs);
        self
    }

    /// Set the random seed (default: 42).
    #[must_use]
    pub fn random_state(mut self, seed: u64) -> Self {
        self.config.random_state = seed;
        self
    }

    /// Build the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns [`OptimizerError::InvalidConfig`] if:
    /// - `cv_folds` is less than 2
    /// - `n_iter` is 0
    /// - `n_jobs` is `Some(0)`
    pub fn build(self) -> Result<OptimizerConfig> {
        if self.config.cv_folds < 2 {
            return Err(OptimizerError::InvalidConfig(
                "cv_folds must be at least 2".to_string(),
            ));
        }

        if self.config.n_iter == 0 {
            return Err(OptimizerError::InvalidConfig(
                "n_iter must be at least 1".to_string(),
            ));
        }

        if self.config.n_jobs == Some(0) {
            return Err(OptimizerError::InvalidConfig(
                "n_jobs must be at least 1".to_string(),
            ));
        }

        Ok(self.config)
    }
}
