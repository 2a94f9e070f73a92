//! Generic persistence for trained models.
//!
//! A persisted model is a JSON document with two parts:
//!
//! ```text
//! {
//!   "meta": { "name": ..., "vendor": ..., "version": ..., "created_at": ..., ... },
//!   "tree": { ...model specific arrays... }
//! }
//! ```
//!
//! Models implement [`PersistentModel`] by turning themselves into a tree of
//! primitive values ([`generate_tree`](PersistentModel::generate_tree)) and
//! back ([`load_tree`](PersistentModel::load_tree)); saving, loading and the
//! byte encoding come for free.

use crate::error::{FormatError, Result, ResultExt};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// Where a model comes from: the analyzer that trained it and the
/// repository state it was trained on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerProvenance {
    pub analyzer: String,
    pub analyzer_version: String,
    pub repository: String,
    pub commit: String,
}

/// Metadata stored next to every persisted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMeta {
    pub name: String,
    pub vendor: String,
    pub description: String,
    /// Version of the crate that wrote the model.
    pub version: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<AnalyzerProvenance>,
}

impl ModelMeta {
    /// Fresh metadata for a model of type `M`.
    pub fn new<M: PersistentModel>() -> Self {
        Self {
            name: M::NAME.to_string(),
            vendor: M::VENDOR.to_string(),
            description: M::DESCRIPTION.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: Utc::now(),
            provenance: None,
        }
    }
}

impl fmt::Display for ModelMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({}) v{}", self.name, self.vendor, self.version)?;
        writeln!(f, "{}", self.description)?;
        write!(f, "created: {}", self.created_at.to_rfc3339())?;
        if let Some(provenance) = &self.provenance {
            write!(
                f,
                "\nanalyzer: {} v{}\nrepository: {} @ {}",
                provenance.analyzer,
                provenance.analyzer_version,
                provenance.repository,
                provenance.commit
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ModelDocument {
    meta: ModelMeta,
    tree: Value,
}

/// A model that can be saved to and loaded from disk.
pub trait PersistentModel: Sized {
    /// Model type name, checked on load.
    const NAME: &'static str;
    const VENDOR: &'static str;
    const DESCRIPTION: &'static str;

    fn meta(&self) -> &ModelMeta;

    /// Convert the model into a tree of primitive values.
    fn generate_tree(&self) -> Result<Value>;

    /// Rebuild the model from its metadata and tree.
    fn load_tree(meta: ModelMeta, tree: Value) -> Result<Self>;

    /// Human-readable summary of the model.
    fn dump(&self) -> String {
        self.meta().to_string()
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        let document = ModelDocument {
            meta: self.meta().clone(),
            tree: self.generate_tree()?,
        };
        Ok(serde_json::to_vec_pretty(&document)?)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let document: ModelDocument = serde_json::from_slice(bytes)?;
        if document.meta.name != Self::NAME {
            return Err(FormatError::CorruptTree(format!(
                "expected a '{}' model, found '{}'",
                Self::NAME,
                document.meta.name
            )));
        }
        debug!(
            "Loading '{}' model written by v{}",
            document.meta.name, document.meta.version
        );
        Self::load_tree(document.meta, document.tree)
    }

    fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        std::fs::write(path, &bytes).context(format!("Failed to write {}", path.display()))?;
        info!("Saved '{}' model to {} ({} bytes)", Self::NAME, path.display(), bytes.len());
        Ok(())
    }

    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(FormatError::ModelNotFound {
                path: path.display().to_string(),
            });
        }
        let bytes = std::fs::read(path).context(format!("Failed to read {}", path.display()))?;
        Self::from_bytes(&bytes).context(format!("Failed to load {}", path.display()))
    }
}
