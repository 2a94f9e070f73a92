//! Code Formatting Rules Library
//!
//! Turns the formatting rules learned for a repository into something a
//! reviewer can read, and stores them on disk.
//!
//! # Overview
//!
//! - **Descriptions**: render rule conditions as readable predicates over
//!   named features, explain suggested whitespace changes and show the code
//!   around them
//! - **Persistence**: [`FormatModel`] keeps one rule set per language and
//!   saves it as flat arrays that load back without loss
//! - **Optimization**: the `optimize` CLI subcommand tunes the rule-induction
//!   base model through the `style-optimizer` crate
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use style_format::{FormatModel, PersistentModel, describe_rule};
//!
//! let model = FormatModel::load("model.json")?;
//! let extractor: FeatureExtractor = serde_json::from_reader(File::open("extractor.json")?)?;
//!
//! for rule in model.rules("javascript")? {
//!     println!("{}", describe_rule(rule, &extractor)?);
//! }
//! ```

pub mod classes;
pub mod descriptions;
pub mod error;
pub mod feature_extractor;
pub mod features;
pub mod model;
pub mod rules;
pub mod virtual_node;

// Re-exports for convenient access
pub use classes::{CLASS_NOOP, CLASSES, Class, composite_representation};
pub use descriptions::{
    describe_rule, describe_rule_attrs, describe_rules, describe_sample, get_change_description,
    get_code_chunk, rule_to_comment,
};
pub use error::{FormatError, Result, ResultExt};
pub use feature_extractor::{
    FEATURES_MAX, FEATURES_MIN, FeatureExtractor, FeatureKey, FeatureLocation,
};
pub use features::{Feature, FeatureGroup, FeatureId, FeatureKind, FeatureNames};
pub use model::{AnalyzerProvenance, FormatModel, ModelMeta, PersistentModel};
pub use rules::{Rule, RuleAttribute, RuleStats, Rules};
pub use virtual_node::{Position, VirtualNode};

static_assertions::assert_impl_all!(FeatureExtractor: Send, Sync);
static_assertions::assert_impl_all!(FormatError: Send, Sync);
