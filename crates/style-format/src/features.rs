//! Feature metadata: which node a feature looks at, what it measures and how
//! its values are encoded.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of the node a feature is computed on, relative to the gap
/// being classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureGroup {
    /// The node owning the gap itself.
    Node,
    /// Siblings to the left.
    Left,
    /// Siblings to the right.
    Right,
    /// Ancestors.
    Parents,
}

impl FeatureGroup {
    /// Render the prefix of a feature name for the node at `node_index`.
    pub fn format(self, node_index: usize) -> String {
        match self {
            FeatureGroup::Node => String::new(),
            FeatureGroup::Left => format!("-{}.", node_index),
            FeatureGroup::Right => format!("+{}.", node_index),
            FeatureGroup::Parents => format!("^{}.", node_index),
        }
    }
}

/// Identifier of a computed feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureId {
    DiffCol,
    DiffLine,
    DiffOffset,
    IndexInternalType,
    IndexLabel,
    IndexReserved,
    IndexRoles,
    InternalType,
    Label,
    Length,
    Reserved,
    Roles,
    StartCol,
    StartLine,
}

impl FeatureId {
    /// Name used when rendering rules.
    pub fn name(self) -> &'static str {
        match self {
            FeatureId::DiffCol => "diff_col",
            FeatureId::DiffLine => "diff_line",
            FeatureId::DiffOffset => "diff_offset",
            FeatureId::IndexInternalType => "index_internal_type",
            FeatureId::IndexLabel => "index_label",
            FeatureId::IndexReserved => "index_reserved",
            FeatureId::IndexRoles => "index_roles",
            FeatureId::InternalType => "internal_type",
            FeatureId::Label => "label",
            FeatureId::Length => "length",
            FeatureId::Reserved => "reserved",
            FeatureId::Roles => "roles",
            FeatureId::StartCol => "start_col",
            FeatureId::StartLine => "start_line",
        }
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value names of a feature and the subset kept by feature selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureNames {
    /// Names of all the values the feature can produce.
    pub names: Vec<String>,
    /// Indices into `names` kept after feature selection. `None` keeps all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<Vec<usize>>,
}

impl FeatureNames {
    pub fn new(names: Vec<String>) -> Self {
        Self {
            names,
            selected: None,
        }
    }

    pub fn with_selected(mut self, selected: Vec<usize>) -> Self {
        self.selected = Some(selected);
        self
    }
}

/// How a feature encodes its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Bag,
    Categorical,
    Ordinal,
}

/// A computed feature.
///
/// - `Bag`: several values may be active at once (one column per value).
/// - `Categorical`: exactly one value is active (one-hot columns).
/// - `Ordinal`: a single integer column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Feature {
    Bag(FeatureNames),
    Categorical(FeatureNames),
    Ordinal(FeatureNames),
}

impl Feature {
    pub fn kind(&self) -> FeatureKind {
        match self {
            Feature::Bag(_) => FeatureKind::Bag,
            Feature::Categorical(_) => FeatureKind::Categorical,
            Feature::Ordinal(_) => FeatureKind::Ordinal,
        }
    }

    fn inner(&self) -> &FeatureNames {
        match self {
            Feature::Bag(names) | Feature::Categorical(names) | Feature::Ordinal(names) => names,
        }
    }

    /// Names of all the values.
    pub fn names(&self) -> &[String] {
        &self.inner().names
    }

    /// Names of the values kept by feature selection, in selection order.
    pub fn selected_names(&self) -> Vec<&str> {
        let inner = self.inner();
        match &inner.selected {
            None => inner.names.iter().map(String::as_str).collect(),
            Some(selected) => selected
                .iter()
                .filter_map(|&i| inner.names.get(i).map(String::as_str))
                .collect(),
        }
    }
}
