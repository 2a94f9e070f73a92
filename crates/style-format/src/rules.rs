//! Learned formatting rules.
//!
//! A [`Rule`] is a conjunction of threshold tests on feature columns that
//! predicts a label. Rules are produced by the rule-induction step and are
//! never mutated afterwards.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// One condition of a rule: `x[feature] > threshold` when `cmp` is true,
/// `x[feature] <= threshold` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuleAttribute {
    pub feature: u16,
    pub cmp: bool,
    pub threshold: f32,
}

impl RuleAttribute {
    pub fn new(feature: u16, cmp: bool, threshold: f32) -> Self {
        Self {
            feature,
            cmp,
            threshold,
        }
    }
}

/// What a rule predicts and how well it did on the training data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuleStats {
    /// Predicted label.
    pub cls: u16,
    /// Fraction of covered training samples with label `cls`.
    pub conf: f32,
    /// Number of covered training samples.
    pub support: u32,
}

impl RuleStats {
    pub fn new(cls: u16, conf: f32, support: u32) -> Self {
        Self { cls, conf, support }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub attrs: Vec<RuleAttribute>,
    pub stats: RuleStats,
    /// Set for rules synthesized rather than mined from the data.
    pub artificial: bool,
}

impl Rule {
    pub fn new(attrs: Vec<RuleAttribute>, stats: RuleStats, artificial: bool) -> Self {
        Self {
            attrs,
            stats,
            artificial,
        }
    }
}

/// The rule set trained for one language, together with the configuration
/// it was trained with.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Rules {
    rules: Vec<Rule>,
    origin_config: Map<String, Value>,
}

impl Rules {
    pub fn new(rules: Vec<Rule>, origin_config: Map<String, Value>) -> Self {
        Self {
            rules,
            origin_config,
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn origin_config(&self) -> &Map<String, Value> {
        &self.origin_config
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    /// Mean number of conditions per rule; zero for an empty set.
    pub fn avg_len(&self) -> f64 {
        if self.rules.is_empty() {
            return 0.0;
        }
        let total: usize = self.rules.iter().map(|rule| rule.attrs.len()).sum();
        total as f64 / self.rules.len() as f64
    }
}

impl<'a> IntoIterator for &'a Rules {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for Rules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rules, avg.len. {:.1}", self.rules.len(), self.avg_len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rules() -> Rules {
        Rules::new(
            vec![
                Rule::new(
                    vec![RuleAttribute::new(0, true, 0.5), RuleAttribute::new(2, false, 3.5)],
                    RuleStats::new(1, 0.9, 40),
                    false,
                ),
                Rule::new(
                    vec![RuleAttribute::new(1, true, 0.5)],
                    RuleStats::new(0, 0.75, 12),
                    true,
                ),
            ],
            Map::new(),
        )
    }

    #[test]
    fn test_iteration_and_avg_len() {
        let rules = sample_rules();
        let classes: Vec<u16> = rules.iter().map(|rule| rule.stats.cls).collect();
        assert_eq!(classes, vec![1, 0]);
        assert_eq!(rules.avg_len(), 1.5);
        assert_eq!(Rules::default().avg_len(), 0.0);
    }

    #[test]
    fn test_display() {
        assert_eq!(sample_rules().to_string(), "2 rules, avg.len. 1.5");
        assert_eq!(Rules::default().to_string(), "0 rules, avg.len. 0.0");
    }
}
