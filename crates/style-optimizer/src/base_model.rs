//! The base models the search tunes, fitted on sparse feature rows.
//!
//! Trees and forests come from `smartcore`. Each fit only materializes the
//! training rows over the columns that are non-zero in them; columns that are
//! zero for every training sample cannot be split on and are left out.
//! Predictions densify test rows in bounded chunks over the same columns.

use crate::error::{OptimizerError, Result};
use crate::space::ParamValue;
use crate::sparse::CsrMatrix;
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_classifier::{
    RandomForestClassifier, RandomForestClassifierParameters,
};
use smartcore::error::Failed;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_classifier::{
    DecisionTreeClassifier, DecisionTreeClassifierParameters, SplitCriterion,
};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Trees per random-forest candidate.
pub const FOREST_N_ESTIMATORS: u16 = 10;

/// Test rows densified at once during prediction.
const PREDICT_CHUNK_ROWS: usize = 1024;

type Tree = DecisionTreeClassifier<f32, u32, DenseMatrix<f32>, Vec<u32>>;
type Forest = RandomForestClassifier<f32, u32, DenseMatrix<f32>, Vec<u32>>;

/// Classifier families the search chooses from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseModelKind {
    RandomForest,
    DecisionTree,
}

impl BaseModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BaseModelKind::RandomForest => "random_forest",
            BaseModelKind::DecisionTree => "decision_tree",
        }
    }
}

impl fmt::Display for BaseModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BaseModelKind {
    type Err = OptimizerError;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "random_forest" => Ok(BaseModelKind::RandomForest),
            "decision_tree" => Ok(BaseModelKind::DecisionTree),
            other => Err(OptimizerError::UnknownBaseModel(other.to_string())),
        }
    }
}

/// How many features a forest split may look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    /// Every feature (`None`).
    #[default]
    All,
    /// A random subset of `sqrt(n_features)` features per split (`"auto"`).
    Sqrt,
}

impl MaxFeatures {
    /// Number of features to consider out of `n_features`.
    pub fn resolve(self, n_features: usize) -> usize {
        match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => ((n_features as f64).sqrt() as usize).clamp(1, n_features.max(1)),
        }
    }

    fn to_param(self) -> ParamValue {
        match self {
            MaxFeatures::All => ParamValue::None,
            MaxFeatures::Sqrt => ParamValue::str("auto"),
        }
    }
}

/// One point of the search space, decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseModelParams {
    pub kind: BaseModelKind,
    pub max_depth: Option<usize>,
    pub max_features: MaxFeatures,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl BaseModelParams {
    /// Decode named parameter values.
    ///
    /// # Errors
    ///
    /// - [`OptimizerError::UnknownParameter`] for names outside of the space
    /// - [`OptimizerError::UnknownBaseModel`] for an unrecognized family
    /// - [`OptimizerError::InvalidData`] for missing or ill-typed values
    pub fn from_params(params: &BTreeMap<String, ParamValue>) -> Result<Self> {
        let mut kind = None;
        let mut max_depth = None;
        let mut max_features = MaxFeatures::All;
        let mut min_samples_split = 2;
        let mut min_samples_leaf = 1;

        for (name, value) in params {
            match name.as_str() {
                "base_model_name" => {
                    let name = value.as_str().ok_or_else(|| invalid(name, value))?;
                    kind = Some(name.parse()?);
                }
                "max_depth" => {
                    max_depth = match value {
                        ParamValue::None => None,
                        ParamValue::Int(depth) => Some(to_usize(name, *depth, 1)?),
                        ParamValue::Str(_) => return Err(invalid(name, value)),
                    };
                }
                "max_features" => {
                    max_features = match value {
                        ParamValue::None => MaxFeatures::All,
                        ParamValue::Str(s) if s == "auto" || s == "sqrt" => MaxFeatures::Sqrt,
                        _ => return Err(invalid(name, value)),
                    };
                }
                "min_samples_split" => {
                    let v = value.as_int().ok_or_else(|| invalid(name, value))?;
                    min_samples_split = to_usize(name, v, 2)?;
                }
                "min_samples_leaf" => {
                    let v = value.as_int().ok_or_else(|| invalid(name, value))?;
                    min_samples_leaf = to_usize(name, v, 1)?;
                }
                other => return Err(OptimizerError::UnknownParameter(other.to_string())),
            }
        }

        let kind = kind.ok_or_else(|| {
            OptimizerError::InvalidData("base_model_name is missing".to_string())
        })?;
        Ok(Self {
            kind,
            max_depth,
            max_features,
            min_samples_split,
            min_samples_leaf,
        })
    }

    /// The parameters keyed by name, as reported to callers.
    pub fn to_params(&self) -> BTreeMap<String, ParamValue> {
        let depth = self
            .max_depth
            .map_or(ParamValue::None, |depth| ParamValue::Int(depth as i64));
        BTreeMap::from([
            (
                "base_model_name".to_string(),
                ParamValue::str(self.kind.as_str()),
            ),
            ("max_depth".to_string(), depth),
            ("max_features".to_string(), self.max_features.to_param()),
            (
                "min_samples_split".to_string(),
                ParamValue::Int(self.min_samples_split as i64),
            ),
            (
                "min_samples_leaf".to_string(),
                ParamValue::Int(self.min_samples_leaf as i64),
            ),
        ])
    }

    /// Fit a model on `y[s]` for every sample `s` in `rows`.
    ///
    /// A training set with a single class, or without any non-zero feature,
    /// yields a model that always predicts its majority class.
    ///
    /// # Errors
    ///
    /// - [`OptimizerError::InvalidData`] for an empty training set or labels
    ///   beyond `u32`
    /// - [`OptimizerError::Model`] when the underlying estimator fails
    pub fn fit(
        &self,
        x: &CsrMatrix,
        y: &[usize],
        rows: &[usize],
        random_state: u64,
    ) -> Result<FittedModel> {
        let labels = rows
            .iter()
            .map(|&sample| label_id(y[sample]))
            .collect::<Result<Vec<u32>>>()?;
        let majority = majority_label(&labels)
            .ok_or_else(|| OptimizerError::InvalidData("empty training set".to_string()))?;

        let columns = x.active_columns(rows);
        if columns.is_empty() || labels.iter().all(|&label| label == majority) {
            return Ok(FittedModel {
                columns,
                estimator: Estimator::Constant(majority),
            });
        }

        let train = dense_matrix(x, rows, &columns)?;
        let max_depth = self
            .max_depth
            .map(|depth| {
                u16::try_from(depth).map_err(|_| {
                    OptimizerError::InvalidData(format!("max_depth {} is too large", depth))
                })
            })
            .transpose()?;

        let estimator = match self.kind {
            BaseModelKind::DecisionTree => {
                let parameters = DecisionTreeClassifierParameters {
                    criterion: SplitCriterion::Gini,
                    max_depth,
                    min_samples_leaf: self.min_samples_leaf,
                    min_samples_split: self.min_samples_split,
                    seed: Some(random_state),
                };
                Estimator::Tree(Tree::fit(&train, &labels, parameters).map_err(model_error)?)
            }
            BaseModelKind::RandomForest => {
                // sqrt is taken over every feature, as if the zero columns were kept
                let m = self.max_features.resolve(x.shape().1).min(columns.len());
                let parameters = RandomForestClassifierParameters {
                    criterion: SplitCriterion::Gini,
                    max_depth,
                    min_samples_leaf: self.min_samples_leaf,
                    min_samples_split: self.min_samples_split,
                    n_trees: FOREST_N_ESTIMATORS,
                    m: Some(m),
                    keep_samples: false,
                    seed: random_state,
                };
                Estimator::Forest(Forest::fit(&train, &labels, parameters).map_err(model_error)?)
            }
        };
        Ok(FittedModel { columns, estimator })
    }
}

impl fmt::Display for BaseModelParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}(max_depth={}, max_features={}, min_samples_split={}, min_samples_leaf={})",
            self.kind,
            self.max_depth
                .map_or_else(|| "None".to_string(), |depth| depth.to_string()),
            self.max_features.to_param(),
            self.min_samples_split,
            self.min_samples_leaf
        )
    }
}

#[derive(Debug)]
enum Estimator {
    Constant(u32),
    Tree(Tree),
    Forest(Forest),
}

/// A base model fitted by [`BaseModelParams::fit`].
#[derive(Debug)]
pub struct FittedModel {
    columns: Vec<usize>,
    estimator: Estimator,
}

impl FittedModel {
    /// Feature columns the model was trained on.
    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    /// Predict the label of every sample in `rows`.
    pub fn predict(&self, x: &CsrMatrix, rows: &[usize]) -> Result<Vec<usize>> {
        let mut predicted = Vec::with_capacity(rows.len());
        for chunk in rows.chunks(PREDICT_CHUNK_ROWS) {
            let labels = match &self.estimator {
                Estimator::Constant(label) => vec![*label; chunk.len()],
                Estimator::Tree(tree) => tree
                    .predict(&dense_matrix(x, chunk, &self.columns)?)
                    .map_err(model_error)?,
                Estimator::Forest(forest) => forest
                    .predict(&dense_matrix(x, chunk, &self.columns)?)
                    .map_err(model_error)?,
            };
            predicted.extend(labels.into_iter().map(|label| label as usize));
        }
        Ok(predicted)
    }
}

/// Validate that the matrix and labels describe the same non-empty sample set.
pub fn check_xy(x: &CsrMatrix, y: &[usize]) -> Result<()> {
    let (n_rows, _) = x.shape();
    if n_rows != y.len() {
        return Err(OptimizerError::InvalidData(format!(
            "{} feature rows but {} labels",
            n_rows,
            y.len()
        )));
    }
    if n_rows == 0 {
        return Err(OptimizerError::InvalidData("no samples".to_string()));
    }
    Ok(())
}

fn dense_matrix(x: &CsrMatrix, rows: &[usize], columns: &[usize]) -> Result<DenseMatrix<f32>> {
    DenseMatrix::new(
        rows.len(),
        columns.len(),
        x.dense_block(rows, columns),
        false,
    )
    .map_err(model_error)
}

/// Most frequent label, the smallest one on ties.
fn majority_label(labels: &[u32]) -> Option<u32> {
    let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
    for &label in labels {
        *counts.entry(label).or_default() += 1;
    }
    let mut best: Option<(u32, usize)> = None;
    for (label, count) in counts {
        if best.is_none_or(|(_, top)| count > top) {
            best = Some((label, count));
        }
    }
    best.map(|(label, _)| label)
}

fn label_id(label: usize) -> Result<u32> {
    u32::try_from(label)
        .map_err(|_| OptimizerError::InvalidData(format!("label {} does not fit in 32 bits", label)))
}

fn model_error(err: Failed) -> OptimizerError {
    OptimizerError::Model(err.to_string())
}

fn invalid(name: &str, value: &ParamValue) -> OptimizerError {
    OptimizerError::InvalidData(format!("{} is not a valid value of '{}'", value, name))
}

fn to_usize(name: &str, value: i64, min: usize) -> Result<usize> {
    usize::try_from(value)
        .ok()
        .filter(|&v| v >= min)
        .ok_or_else(|| invalid(name, &ParamValue::Int(value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn params(pairs: &[(&str, ParamValue)]) -> BTreeMap<String, ParamValue> {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    fn tree_params() -> BaseModelParams {
        BaseModelParams {
            kind: BaseModelKind::DecisionTree,
            max_depth: None,
            max_features: MaxFeatures::All,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }

    /// Class given by the sign of column 1; columns 0 and 3 stay empty.
    fn signed_dataset(n: usize) -> (CsrMatrix, Vec<usize>) {
        let mut triplets = Vec::new();
        let mut y = Vec::new();
        for i in 0..n {
            let class = i % 2;
            let value = if class == 0 { -1.0 - i as f32 } else { 1.0 + i as f32 };
            triplets.push((i, 1, value));
            triplets.push((i, 2, (i % 3) as f32));
            y.push(class);
        }
        (CsrMatrix::from_triplets(n, 4, &triplets).unwrap(), y)
    }

    #[test]
    fn test_base_model_kind() {
        assert_eq!(
            "decision_tree".parse::<BaseModelKind>().unwrap(),
            BaseModelKind::DecisionTree
        );
        assert_eq!(BaseModelKind::RandomForest.to_string(), "random_forest");
        assert!(matches!(
            "gradient_boosting".parse::<BaseModelKind>(),
            Err(OptimizerError::UnknownBaseModel(_))
        ));
    }

    #[test]
    fn test_max_features_resolve() {
        assert_eq!(MaxFeatures::All.resolve(9), 9);
        assert_eq!(MaxFeatures::Sqrt.resolve(9), 3);
        assert_eq!(MaxFeatures::Sqrt.resolve(2), 1);
    }

    #[test]
    fn test_from_params() {
        let decoded = BaseModelParams::from_params(&params(&[
            ("base_model_name", ParamValue::str("random_forest")),
            ("max_depth", ParamValue::Int(5)),
            ("max_features", ParamValue::str("auto")),
            ("min_samples_split", ParamValue::Int(4)),
            ("min_samples_leaf", ParamValue::Int(3)),
        ]))
        .unwrap();
        let expected = BaseModelParams {
            kind: BaseModelKind::RandomForest,
            max_depth: Some(5),
            max_features: MaxFeatures::Sqrt,
            min_samples_split: 4,
            min_samples_leaf: 3,
        };
        assert_eq!(decoded, expected);
        assert_eq!(
            BaseModelParams::from_params(&expected.to_params()).unwrap(),
            expected
        );
        assert_eq!(
            expected.to_string(),
            "random_forest(max_depth=5, max_features=auto, min_samples_split=4, min_samples_leaf=3)"
        );
    }

    #[test]
    fn test_from_params_errors() {
        let unknown_model = params(&[("base_model_name", ParamValue::str("svm"))]);
        assert!(matches!(
            BaseModelParams::from_params(&unknown_model),
            Err(OptimizerError::UnknownBaseModel(_))
        ));

        let unknown_param = params(&[
            ("base_model_name", ParamValue::str("decision_tree")),
            ("learning_rate", ParamValue::Int(1)),
        ]);
        assert!(matches!(
            BaseModelParams::from_params(&unknown_param),
            Err(OptimizerError::UnknownParameter(_))
        ));

        let missing_model = params(&[("max_depth", ParamValue::None)]);
        assert!(BaseModelParams::from_params(&missing_model).is_err());

        let bad_split = params(&[
            ("base_model_name", ParamValue::str("decision_tree")),
            ("min_samples_split", ParamValue::Int(1)),
        ]);
        assert!(BaseModelParams::from_params(&bad_split).is_err());
    }

    #[test]
    fn test_tree_trains_on_active_columns() {
        let (x, y) = signed_dataset(20);
        let train: Vec<usize> = (0..16).collect();
        let test: Vec<usize> = (16..20).collect();
        let model = tree_params().fit(&x, &y, &train, 0).unwrap();
        assert_eq!(model.columns(), &[1, 2]);
        assert_eq!(model.predict(&x, &test).unwrap(), vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_forest_predicts_held_out_rows() {
        let (x, y) = signed_dataset(40);
        let train: Vec<usize> = (0..32).collect();
        let test: Vec<usize> = (32..40).collect();
        let forest = BaseModelParams {
            kind: BaseModelKind::RandomForest,
            max_features: MaxFeatures::Sqrt,
            ..tree_params()
        };
        let model = forest.fit(&x, &y, &train, 7).unwrap();
        assert_eq!(model.predict(&x, &test).unwrap(), y[32..].to_vec());
    }

    #[test]
    fn test_single_class_training_set() {
        let (x, y) = signed_dataset(10);
        let evens = [0, 2, 4, 6];
        let model = tree_params().fit(&x, &y, &evens, 0).unwrap();
        assert_eq!(model.predict(&x, &[1, 3]).unwrap(), vec![0, 0]);
    }

    #[test]
    fn test_all_zero_features_predict_majority() {
        let x = CsrMatrix::from_triplets(5, 3, &[]).unwrap();
        let y = vec![2, 1, 1, 2, 1];
        let model = tree_params().fit(&x, &y, &[0, 1, 2, 3, 4], 0).unwrap();
        assert!(model.columns().is_empty());
        assert_eq!(model.predict(&x, &[0, 3]).unwrap(), vec![1, 1]);
    }

    #[test]
    fn test_empty_training_set() {
        let (x, y) = signed_dataset(4);
        assert!(matches!(
            tree_params().fit(&x, &y, &[], 0),
            Err(OptimizerError::InvalidData(_))
        ));
    }

    #[test]
    fn test_check_xy() {
        let x = CsrMatrix::from_dense(&[vec![1.0], vec![0.0]], 1).unwrap();
        assert!(check_xy(&x, &[0, 1]).is_ok());
        assert!(check_xy(&x, &[0]).is_err());
        let empty = CsrMatrix::from_dense(&[], 1).unwrap();
        assert!(check_xy(&empty, &[]).is_err());
    }
}
