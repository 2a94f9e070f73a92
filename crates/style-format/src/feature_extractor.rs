//! Metadata of a fitted feature extractor.
//!
//! The extraction itself (walking syntax trees, producing feature vectors)
//! happens upstream. What rule descriptions need from it is captured here:
//!
//! - the label table: which class sequence each label stands for;
//! - the feature table: the [`Feature`] computed for every
//!   `(group, node_index, feature_id)`;
//! - the flat index table: which feature (and which value of it) every
//!   column of the feature matrix corresponds to.
//!
//! The last two exist only after fitting. An extractor built with
//! [`FeatureExtractor::new`] can render labels but not rules.

use crate::classes::composite_representation;
use crate::error::{FormatError, Result};
use crate::features::{Feature, FeatureGroup, FeatureId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Smallest value an ordinal feature can take.
pub const FEATURES_MIN: i64 = u8::MIN as i64;

/// Largest value an ordinal feature can take.
pub const FEATURES_MAX: i64 = u8::MAX as i64;

/// Identifies a logical feature: what is measured on which node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureKey {
    pub group: FeatureGroup,
    pub node_index: usize,
    pub feature_id: FeatureId,
}

impl FeatureKey {
    pub fn new(group: FeatureGroup, node_index: usize, feature_id: FeatureId) -> Self {
        Self {
            group,
            node_index,
            feature_id,
        }
    }

    /// Name of the feature as shown to users, e.g. `-1.reserved`.
    pub fn display_name(&self) -> String {
        format!("{}{}", self.group.format(self.node_index), self.feature_id.name())
    }
}

/// Where a column of the feature matrix comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureLocation {
    pub group: FeatureGroup,
    pub node_index: usize,
    pub feature_id: FeatureId,
    /// Index of the value inside the feature's names.
    pub index: usize,
}

impl FeatureLocation {
    pub fn key(&self) -> FeatureKey {
        FeatureKey::new(self.group, self.node_index, self.feature_id)
    }
}

/// A feature stored in the serialized form of the extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEntry {
    pub group: FeatureGroup,
    pub node_index: usize,
    pub feature_id: FeatureId,
    pub feature: Feature,
}

/// Flat, serializable form of [`FeatureExtractor`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureExtractorRecord {
    labels: Vec<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    features: Option<Vec<FeatureEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    index_to_feature: Option<Vec<FeatureLocation>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FeatureExtractorRecord", into = "FeatureExtractorRecord")]
pub struct FeatureExtractor {
    labels: Vec<Vec<usize>>,
    composite_class_representations: Vec<String>,
    class_sequences_to_labels: HashMap<Vec<usize>, usize>,
    features: Option<HashMap<FeatureKey, Feature>>,
    index_to_feature: Option<Vec<FeatureLocation>>,
}

impl FeatureExtractor {
    /// Create an unfitted extractor from its label table.
    ///
    /// `labels[i]` is the class sequence of label `i`. Every sequence must be
    /// unique.
    pub fn new(labels: Vec<Vec<usize>>) -> Result<Self> {
        let mut class_sequences_to_labels = HashMap::with_capacity(labels.len());
        for (label, sequence) in labels.iter().enumerate() {
            if let Some(previous) = class_sequences_to_labels.insert(sequence.clone(), label) {
                return Err(FormatError::Validation(format!(
                    "class sequence {:?} is used by labels {} and {}",
                    sequence, previous, label
                )));
            }
        }
        let composite_class_representations = labels
            .iter()
            .map(|sequence| composite_representation(sequence))
            .collect();

        Ok(Self {
            labels,
            composite_class_representations,
            class_sequences_to_labels,
            features: None,
            index_to_feature: None,
        })
    }

    /// Attach the feature metadata produced by fitting.
    ///
    /// Every entry of `index_to_feature` must point at a registered feature
    /// and at an existing value of that feature.
    pub fn fit(
        mut self,
        features: HashMap<FeatureKey, Feature>,
        index_to_feature: Vec<FeatureLocation>,
    ) -> Result<Self> {
        for (column, location) in index_to_feature.iter().enumerate() {
            let key = location.key();
            let feature = features
                .get(&key)
                .ok_or_else(|| FormatError::UnknownFeature(key.display_name()))?;
            if location.index >= feature.names().len() {
                return Err(FormatError::Validation(format!(
                    "column {} points at value {} of '{}' which has {} values",
                    column,
                    location.index,
                    key.display_name(),
                    feature.names().len()
                )));
            }
        }
        debug!(
            "Fitted feature extractor: {} features, {} columns",
            features.len(),
            index_to_feature.len()
        );
        self.features = Some(features);
        self.index_to_feature = Some(index_to_feature);
        Ok(self)
    }

    pub fn is_fitted(&self) -> bool {
        self.features.is_some() && self.index_to_feature.is_some()
    }

    /// Number of columns in the feature matrix.
    pub fn n_columns(&self) -> Result<usize> {
        self.index_to_feature
            .as_ref()
            .map(Vec::len)
            .ok_or(FormatError::NotFitted)
    }

    /// Resolve a column of the feature matrix.
    pub fn location(&self, feature_index: usize) -> Result<&FeatureLocation> {
        self.index_to_feature
            .as_ref()
            .ok_or(FormatError::NotFitted)?
            .get(feature_index)
            .ok_or(FormatError::UnknownFeatureIndex(feature_index))
    }

    pub fn feature(&self, key: &FeatureKey) -> Result<&Feature> {
        self.features
            .as_ref()
            .ok_or(FormatError::NotFitted)?
            .get(key)
            .ok_or_else(|| FormatError::UnknownFeature(key.display_name()))
    }

    /// Representations of every label, indexed by label.
    pub fn composite_class_representations(&self) -> &[String] {
        &self.composite_class_representations
    }

    pub fn label_representation(&self, label: usize) -> Result<&str> {
        self.composite_class_representations
            .get(label)
            .map(String::as_str)
            .ok_or(FormatError::UnknownLabel(label))
    }

    pub fn class_sequence_to_label(&self, sequence: &[usize]) -> Result<usize> {
        self.class_sequences_to_labels
            .get(sequence)
            .copied()
            .ok_or_else(|| FormatError::UnknownClassSequence(sequence.to_vec()))
    }

    pub fn class_sequence(&self, label: usize) -> Option<&[usize]> {
        self.labels.get(label).map(Vec::as_slice)
    }

    pub fn n_labels(&self) -> usize {
        self.labels.len()
    }
}

impl TryFrom<FeatureExtractorRecord> for FeatureExtractor {
    type Error = FormatError;

    fn try_from(record: FeatureExtractorRecord) -> Result<Self> {
        let extractor = FeatureExtractor::new(record.labels)?;
        match (record.features, record.index_to_feature) {
            (None, None) => Ok(extractor),
            (Some(entries), Some(index_to_feature)) => {
                let features = entries
                    .into_iter()
                    .map(|entry| {
                        (
                            FeatureKey::new(entry.group, entry.node_index, entry.feature_id),
                            entry.feature,
                        )
                    })
                    .collect();
                extractor.fit(features, index_to_feature)
            }
            _ => Err(FormatError::Validation(
                "'features' and 'index_to_feature' must be given together".to_string(),
            )),
        }
    }
}

impl From<FeatureExtractor> for FeatureExtractorRecord {
    fn from(extractor: FeatureExtractor) -> Self {
        let features = extractor.features.map(|features| {
            let mut entries: Vec<FeatureEntry> = features
                .into_iter()
                .map(|(key, feature)| FeatureEntry {
                    group: key.group,
                    node_index: key.node_index,
                    feature_id: key.feature_id,
                    feature,
                })
                .collect();
            entries.sort_by_key(|entry| (entry.group, entry.node_index, entry.feature_id));
            entries
        });
        Self {
            labels: extractor.labels,
            features,
            index_to_feature: extractor.index_to_feature,
        }
    }
}
