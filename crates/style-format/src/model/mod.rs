//! Trained model containers and their on-disk format.

pub mod format_model;
pub mod persist;

pub use format_model::{FormatModel, RulesTree, assemble_rules, disassemble_rules};
pub use persist::{AnalyzerProvenance, ModelMeta, PersistentModel};
