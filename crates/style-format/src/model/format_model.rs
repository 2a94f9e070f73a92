//! The persisted formatting model: one [`Rules`] per language.
//!
//! Rules are stored as parallel flat arrays. For `n` rules with `m` conditions
//! in total:
//!
//! | Array | Length | Type |
//! |-------|--------|------|
//! | `cls`, `conf`, `support`, `artificial`, `lengths` | `n` | `u16`, `f32`, `u32`, `bool`, `u16` |
//! | `features`, `cmps`, `thresholds` | `m` | `u16`, `bool`, `f32` |
//!
//! The conditions of rule `i` are the next `lengths[i]` entries of the
//! condition arrays.

use super::persist::{AnalyzerProvenance, ModelMeta, PersistentModel};
use crate::error::{FormatError, Result};
use crate::rules::{Rule, RuleAttribute, RuleStats, Rules};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Flattened rules of one language.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RulesTree {
    pub cls: Vec<u16>,
    pub conf: Vec<f32>,
    pub support: Vec<u32>,
    pub artificial: Vec<bool>,
    pub features: Vec<u16>,
    pub cmps: Vec<bool>,
    pub thresholds: Vec<f32>,
    pub lengths: Vec<u16>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FormatModelTree {
    languages: Vec<String>,
    origin_configs: Vec<Map<String, Value>>,
    ruless: Vec<RulesTree>,
}

/// Flatten rules into parallel arrays.
pub fn disassemble_rules(rules: &[Rule]) -> Result<RulesTree> {
    let mut tree = RulesTree::default();
    for (i, rule) in rules.iter().enumerate() {
        let length = u16::try_from(rule.attrs.len()).map_err(|_| {
            FormatError::Validation(format!(
                "rule {} has {} conditions, more than can be stored",
                i,
                rule.attrs.len()
            ))
        })?;
        if !rule.stats.conf.is_finite() {
            return Err(FormatError::Validation(format!(
                "rule {} has a non-finite confidence {}",
                i, rule.stats.conf
            )));
        }
        if let Some(attr) = rule.attrs.iter().find(|attr| !attr.threshold.is_finite()) {
            return Err(FormatError::Validation(format!(
                "rule {} compares feature {} with a non-finite threshold {}",
                i, attr.feature, attr.threshold
            )));
        }
        tree.cls.push(rule.stats.cls);
        tree.conf.push(rule.stats.conf);
        tree.support.push(rule.stats.support);
        tree.artificial.push(rule.artificial);
        tree.lengths.push(length);
        for attr in &rule.attrs {
            tree.features.push(attr.feature);
            tree.cmps.push(attr.cmp);
            tree.thresholds.push(attr.threshold);
        }
    }
    Ok(tree)
}

/// Rebuild rules from parallel arrays, in their original order.
pub fn assemble_rules(tree: &RulesTree) -> Result<Vec<Rule>> {
    let n_rules = tree.lengths.len();
    for (name, len) in [
        ("cls", tree.cls.len()),
        ("conf", tree.conf.len()),
        ("support", tree.support.len()),
        ("artificial", tree.artificial.len()),
    ] {
        if len != n_rules {
            return Err(FormatError::CorruptTree(format!(
                "'{}' has {} entries but there are {} rules",
                name, len, n_rules
            )));
        }
    }
    let n_attrs: usize = tree.lengths.iter().map(|&len| len as usize).sum();
    for (name, len) in [
        ("features", tree.features.len()),
        ("cmps", tree.cmps.len()),
        ("thresholds", tree.thresholds.len()),
    ] {
        if len != n_attrs {
            return Err(FormatError::CorruptTree(format!(
                "'{}' has {} entries but the rules have {} conditions",
                name, len, n_attrs
            )));
        }
    }

    let mut attrs = tree
        .features
        .iter()
        .zip(&tree.cmps)
        .zip(&tree.thresholds)
        .map(|((&feature, &cmp), &threshold)| RuleAttribute::new(feature, cmp, threshold));

    let mut rules = Vec::with_capacity(n_rules);
    for i in 0..n_rules {
        rules.push(Rule::new(
            attrs.by_ref().take(tree.lengths[i] as usize).collect(),
            RuleStats::new(tree.cls[i], tree.conf[i], tree.support[i]),
            tree.artificial[i],
        ));
    }
    Ok(rules)
}

/// Rules for every trained language.
///
/// Iteration follows insertion order; [`languages`](Self::languages),
/// persistence and [`dump`](PersistentModel::dump) use sorted order.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatModel {
    meta: ModelMeta,
    rules_by_lang: Vec<(String, Rules)>,
}

impl Default for FormatModel {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatModel {
    pub fn new() -> Self {
        Self {
            meta: ModelMeta::new::<Self>(),
            rules_by_lang: Vec::new(),
        }
    }

    /// Record which analyzer trained the model and on what.
    pub fn construct(
        mut self,
        analyzer: impl Into<String>,
        analyzer_version: impl Into<String>,
        repository: impl Into<String>,
        commit: impl Into<String>,
    ) -> Self {
        self.meta.provenance = Some(AnalyzerProvenance {
            analyzer: analyzer.into(),
            analyzer_version: analyzer_version.into(),
            repository: repository.into(),
            commit: commit.into(),
        });
        self
    }

    /// Languages with trained rules, sorted.
    pub fn languages(&self) -> Vec<&str> {
        let mut languages: Vec<&str> = self.rules_by_lang.iter().map(|(l, _)| l.as_str()).collect();
        languages.sort_unstable();
        languages
    }

    fn position(&self, lang: &str) -> Option<usize> {
        self.rules_by_lang.iter().position(|(l, _)| l == lang)
    }

    pub fn get(&self, lang: &str) -> Option<&Rules> {
        self.position(lang).map(|i| &self.rules_by_lang[i].1)
    }

    pub fn get_mut(&mut self, lang: &str) -> Option<&mut Rules> {
        self.position(lang).map(move |i| &mut self.rules_by_lang[i].1)
    }

    /// Like [`get`](Self::get) but fails for unknown languages.
    pub fn rules(&self, lang: &str) -> Result<&Rules> {
        self.get(lang)
            .ok_or_else(|| FormatError::LanguageNotFound(lang.to_string()))
    }

    /// Set the rules of a language. An existing entry is replaced in place
    /// and returned.
    pub fn insert(&mut self, lang: impl Into<String>, rules: Rules) -> Option<Rules> {
        let lang = lang.into();
        match self.position(&lang) {
            Some(i) => Some(std::mem::replace(&mut self.rules_by_lang[i].1, rules)),
            None => {
                self.rules_by_lang.push((lang, rules));
                None
            }
        }
    }

    pub fn remove(&mut self, lang: &str) -> Option<Rules> {
        self.position(lang).map(|i| self.rules_by_lang.remove(i).1)
    }

    pub fn contains(&self, lang: &str) -> bool {
        self.position(lang).is_some()
    }

    pub fn len(&self) -> usize {
        self.rules_by_lang.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules_by_lang.is_empty()
    }

    /// `(language, rules)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Rules)> {
        self.rules_by_lang.iter().map(|(l, r)| (l.as_str(), r))
    }

    fn sorted(&self) -> Vec<(&str, &Rules)> {
        let mut entries: Vec<(&str, &Rules)> = self.iter().collect();
        entries.sort_unstable_by_key(|(lang, _)| *lang);
        entries
    }
}

impl PersistentModel for FormatModel {
    const NAME: &'static str = "code-format";
    const VENDOR: &'static str = "source{d}";
    const DESCRIPTION: &'static str =
        "Formatting rules (whitespace, indentation, quotes) learned per language.";

    fn meta(&self) -> &ModelMeta {
        &self.meta
    }

    fn generate_tree(&self) -> Result<Value> {
        let sorted = self.sorted();
        let mut tree = FormatModelTree {
            languages: Vec::with_capacity(sorted.len()),
            origin_configs: Vec::with_capacity(sorted.len()),
            ruless: Vec::with_capacity(sorted.len()),
        };
        for (lang, rules) in sorted {
            tree.languages.push(lang.to_string());
            tree.origin_configs.push(rules.origin_config().clone());
            tree.ruless.push(disassemble_rules(rules.rules())?);
        }
        Ok(serde_json::to_value(tree)?)
    }

    fn load_tree(meta: ModelMeta, tree: Value) -> Result<Self> {
        let tree: FormatModelTree = serde_json::from_value(tree)?;
        if tree.origin_configs.len() != tree.languages.len()
            || tree.ruless.len() != tree.languages.len()
        {
            return Err(FormatError::CorruptTree(format!(
                "{} languages, {} origin configs and {} rule sets",
                tree.languages.len(),
                tree.origin_configs.len(),
                tree.ruless.len()
            )));
        }

        let mut model = FormatModel {
            meta,
            rules_by_lang: Vec::with_capacity(tree.languages.len()),
        };
        for ((lang, origin_config), rules_tree) in tree
            .languages
            .into_iter()
            .zip(tree.origin_configs)
            .zip(&tree.ruless)
        {
            let rules = assemble_rules(rules_tree)?;
            debug!("Loaded {} rules for {}", rules.len(), lang);
            if model.insert(lang.clone(), Rules::new(rules, origin_config)).is_some() {
                return Err(FormatError::CorruptTree(format!(
                    "language '{}' is stored twice",
                    lang
                )));
            }
        }
        Ok(model)
    }

    fn dump(&self) -> String {
        let mut result = self.meta.to_string();
        for (lang, rules) in self.sorted() {
            result.push_str(&format!("\n\n# {}\n{}", lang, rules));
        }
        result
    }
}

static_assertions::assert_impl_all!(FormatModel: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn rule(attrs: &[(u16, bool, f32)], cls: u16, conf: f32, support: u32, artificial: bool) -> Rule {
        Rule::new(
            attrs
                .iter()
                .map(|&(f, c, t)| RuleAttribute::new(f, c, t))
                .collect(),
            RuleStats::new(cls, conf, support),
            artificial,
        )
    }

    fn javascript_rules() -> Rules {
        let mut config = Map::new();
        config.insert("max_depth".to_string(), json!(10));
        config.insert("base_model_name".to_string(), json!("decision_tree"));
        Rules::new(
            vec![
                rule(&[(0, true, 0.5), (7, false, 3.5)], 1, 0.93, 120, false),
                rule(&[(4, true, 0.5)], 0, 0.8, 15, true),
                rule(&[], 2, 0.51, 3, false),
            ],
            config,
        )
    }

    fn python_rules() -> Rules {
        Rules::new(vec![rule(&[(1, false, 1.5)], 3, 1.0, 7, false)], Map::new())
    }

    #[test]
    fn test_disassemble_layout() {
        let tree = disassemble_rules(javascript_rules().rules()).unwrap();
        assert_eq!(tree.lengths, vec![2, 1, 0]);
        assert_eq!(tree.features, vec![0, 7, 4]);
        assert_eq!(tree.cmps, vec![true, false, true]);
        assert_eq!(tree.cls, vec![1, 0, 2]);
        assert_eq!(tree.artificial, vec![false, true, false]);
    }

    #[test]
    fn test_assemble_round_trip() {
        let rules = javascript_rules();
        let tree = disassemble_rules(rules.rules()).unwrap();
        assert_eq!(assemble_rules(&tree).unwrap(), rules.rules());
    }

    #[test]
    fn test_assemble_rejects_inconsistent_arrays() {
        let mut tree = disassemble_rules(javascript_rules().rules()).unwrap();
        tree.thresholds.pop();
        assert!(matches!(assemble_rules(&tree), Err(FormatError::CorruptTree(_))));

        let mut tree = disassemble_rules(javascript_rules().rules()).unwrap();
        tree.conf.push(0.5);
        assert!(matches!(assemble_rules(&tree), Err(FormatError::CorruptTree(_))));
    }

    #[test]
    fn test_disassemble_rejects_non_finite_values() {
        let infinite = rule(&[(0, true, 0.5), (3, false, f32::INFINITY)], 1, 0.9, 4, false);
        match disassemble_rules(&[infinite]) {
            Err(FormatError::Validation(message)) => assert!(message.contains("feature 3")),
            other => panic!("expected a validation error, got {:?}", other),
        }

        let unknown_conf = rule(&[(0, true, 0.5)], 1, f32::NAN, 4, false);
        assert!(matches!(
            disassemble_rules(&[unknown_conf]),
            Err(FormatError::Validation(_))
        ));

        let mut model = FormatModel::new();
        model.insert(
            "go",
            Rules::new(vec![rule(&[(2, true, f32::NEG_INFINITY)], 0, 1.0, 1, false)], Map::new()),
        );
        assert_eq!(model.generate_tree().unwrap_err().error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_keyed_access() {
        let mut model = FormatModel::new();
        assert!(model.is_empty());
        assert!(model.insert("python", python_rules()).is_none());
        assert!(model.insert("javascript", javascript_rules()).is_none());

        assert_eq!(model.len(), 2);
        assert!(model.contains("javascript"));
        assert!(!model.contains("go"));
        assert_eq!(model.get("python").unwrap().len(), 1);
        assert!(matches!(model.rules("go"), Err(FormatError::LanguageNotFound(_))));

        // insertion order for iteration, sorted order for languages
        let order: Vec<&str> = model.iter().map(|(lang, _)| lang).collect();
        assert_eq!(order, vec!["python", "javascript"]);
        assert_eq!(model.languages(), vec!["javascript", "python"]);

        // replacing keeps the position
        let previous = model.insert("python", javascript_rules()).unwrap();
        assert_eq!(previous, python_rules());
        let order: Vec<&str> = model.iter().map(|(lang, _)| lang).collect();
        assert_eq!(order, vec!["python", "javascript"]);

        assert!(model.remove("python").is_some());
        assert_eq!(model.len(), 1);
    }

    #[test]
    fn test_tree_round_trip() {
        let mut model = FormatModel::new().construct("format", "1", "https://example.com/repo", "abc");
        model.insert("python", python_rules());
        model.insert("javascript", javascript_rules());

        let tree = model.generate_tree().unwrap();
        assert_eq!(tree["languages"], json!(["javascript", "python"]));
        assert_eq!(tree["origin_configs"][0]["max_depth"], json!(10));

        let loaded = FormatModel::load_tree(model.meta().clone(), tree).unwrap();
        assert_eq!(loaded.get("javascript"), model.get("javascript"));
        assert_eq!(loaded.get("python"), model.get("python"));
    }

    #[test]
    fn test_load_tree_rejects_mismatched_languages() {
        let tree = json!({"languages": ["go"], "origin_configs": [], "ruless": []});
        let result = FormatModel::load_tree(FormatModel::new().meta().clone(), tree);
        assert!(matches!(result, Err(FormatError::CorruptTree(_))));
    }

    #[test]
    fn test_dump_sorted_sections() {
        let mut model = FormatModel::new();
        model.insert("python", python_rules());
        model.insert("javascript", javascript_rules());
        let dump = model.dump();
        assert!(dump.starts_with("code-format (source{d})"));
        let js = dump.find("# javascript\n3 rules, avg.len. 1.0").unwrap();
        let py = dump.find("# python\n1 rules, avg.len. 1.0").unwrap();
        assert!(js < py);
    }

    fn arb_rule() -> impl Strategy<Value = Rule> {
        (
            prop::collection::vec((any::<u16>(), any::<bool>(), -1000.0f32..1000.0), 0..6),
            any::<u16>(),
            0.0f32..=1.0,
            any::<u32>(),
            any::<bool>(),
        )
            .prop_map(|(attrs, cls, conf, support, artificial)| {
                rule(&attrs, cls, conf, support, artificial)
            })
    }

    proptest! {
        #[test]
        fn test_disassemble_assemble_is_lossless(rules in prop::collection::vec(arb_rule(), 0..20)) {
            let tree = disassemble_rules(&rules).unwrap();
            let back = assemble_rules(&tree).unwrap();
            prop_assert_eq!(back.len(), rules.len());
            for (a, b) in back.iter().zip(&rules) {
                prop_assert_eq!(&a.attrs, &b.attrs);
                prop_assert_eq!(a.stats, b.stats);
                prop_assert_eq!(a.artificial, b.artificial);
                for (x, y) in a.attrs.iter().zip(&b.attrs) {
                    prop_assert_eq!(x.threshold.to_bits(), y.threshold.to_bits());
                }
            }
        }
    }
}
