//! Base Model Hyper-parameter Optimization
//!
//! Chooses how the formatting analyzer's rule induction grows its base
//! model. Given a sparse feature matrix and class labels, the search picks a
//! classifier family (random forest or decision tree) and its depth, feature
//! subsampling and split sizes by Bayesian optimization (a tree-structured
//! Parzen estimator from the `optimizer` crate), scoring each
//! candidate by stratified k-fold cross-validated accuracy.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use style_optimizer::{CsrMatrix, Optimizer, OptimizerConfig};
//!
//! let x = CsrMatrix::from_dense(&rows, n_features)?;
//! let config = OptimizerConfig::builder()
//!     .cv_folds(3)
//!     .n_iter(50)
//!     .n_jobs(4)
//!     .build()?;
//!
//! let (score, params) = Optimizer::new(config).optimize(&x, &labels)?;
//! println!("best accuracy: {:.3}", score);
//! for (name, value) in &params {
//!     println!("  {} = {}", name, value);
//! }
//! ```
//!
//! # Parallelism
//!
//! Every [`Optimizer::optimize`] call runs on its own rayon pool with
//! `n_jobs` workers (all cores when unset). The cross-validation folds of a
//! candidate are fitted in parallel on that pool while candidates are
//! evaluated one after another. Results do not depend on the number of
//! workers.

pub mod base_model;
pub mod config;
pub mod cv;
pub mod error;
pub mod search;
pub mod space;
pub mod sparse;

// Re-exports for convenient access
pub use base_model::{
    BaseModelKind, BaseModelParams, FOREST_N_ESTIMATORS, FittedModel, MaxFeatures,
};
pub use config::{OptimizerConfig, OptimizerConfigBuilder};
pub use cv::{Fold, StratifiedKFold, cross_val_score};
pub use error::{OptimizerError, Result, ResultExt};
pub use search::{N_INITIAL_POINTS, Optimizer};
pub use space::{ParamValue, SearchSpace};
pub use sparse::CsrMatrix;

static_assertions::assert_impl_all!(Optimizer: Send, Sync);
static_assertions::assert_impl_all!(CsrMatrix: Send, Sync);
static_assertions::assert_impl_all!(OptimizerError: Send, Sync);
