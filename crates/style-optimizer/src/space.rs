//! The search space of the base model and its parameter values.

use crate::base_model::{BaseModelKind, BaseModelParams, MaxFeatures};
use crate::error::{OptimizerError, Result};
use optimizer::Trial;
use optimizer::parameter::{CategoricalParam, IntParam, Parameter};
use optimizer::sampler::CompletedTrial;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One parameter value.
///
/// Serializes as the bare JSON value: `5`, `"auto"` or `null`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Str(String),
    None,
}

impl ParamValue {
    pub fn str(value: impl Into<String>) -> Self {
        ParamValue::Str(value.into())
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ParamValue::None)
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(value) => write!(f, "{}", value),
            ParamValue::Str(value) => write!(f, "{}", value),
            ParamValue::None => write!(f, "None"),
        }
    }
}

/// The dimensions tuned for the rule-induction base model.
///
/// A trial samples every dimension, so each one is defined once here and
/// shared between suggesting values and reading back the best trial.
#[derive(Debug, Clone)]
pub struct SearchSpace {
    base_model_name: CategoricalParam<BaseModelKind>,
    max_depth: CategoricalParam<Option<usize>>,
    max_features: CategoricalParam<MaxFeatures>,
    min_samples_split: IntParam,
    min_samples_leaf: IntParam,
}

impl SearchSpace {
    pub fn base_model() -> Self {
        Self {
            base_model_name: CategoricalParam::new(vec![
                BaseModelKind::RandomForest,
                BaseModelKind::DecisionTree,
            ])
            .name("base_model_name"),
            max_depth: CategoricalParam::new(vec![None, Some(5), Some(10)]).name("max_depth"),
            max_features: CategoricalParam::new(vec![MaxFeatures::All, MaxFeatures::Sqrt])
                .name("max_features"),
            min_samples_split: IntParam::new(2, 20).name("min_samples_split"),
            min_samples_leaf: IntParam::new(1, 20).name("min_samples_leaf"),
        }
    }

    /// Sample every dimension for one trial.
    pub fn suggest(&self, trial: &mut Trial) -> Result<BaseModelParams> {
        Ok(BaseModelParams {
            kind: self.base_model_name.suggest(trial)?,
            max_depth: self.max_depth.suggest(trial)?,
            max_features: self.max_features.suggest(trial)?,
            min_samples_split: to_usize(self.min_samples_split.suggest(trial)?)?,
            min_samples_leaf: to_usize(self.min_samples_leaf.suggest(trial)?)?,
        })
    }

    /// Read back the values a finished trial was evaluated with.
    ///
    /// # Errors
    ///
    /// [`OptimizerError::InvalidData`] when the trial did not sample one of
    /// the dimensions of this space.
    pub fn decode(&self, trial: &CompletedTrial<f64>) -> Result<BaseModelParams> {
        Ok(BaseModelParams {
            kind: lookup(trial, &self.base_model_name)?,
            max_depth: lookup(trial, &self.max_depth)?,
            max_features: lookup(trial, &self.max_features)?,
            min_samples_split: to_usize(lookup(trial, &self.min_samples_split)?)?,
            min_samples_leaf: to_usize(lookup(trial, &self.min_samples_leaf)?)?,
        })
    }
}

fn lookup<P: Parameter>(trial: &CompletedTrial<f64>, param: &P) -> Result<P::Value> {
    trial.get(param).ok_or_else(|| {
        OptimizerError::InvalidData(format!(
            "trial {} has no value for {}",
            trial.id,
            param.label()
        ))
    })
}

fn to_usize(value: i64) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| OptimizerError::InvalidData(format!("{} is not a valid sample size", value)))
}
