//! Natural-language descriptions of rules, samples and suggested changes.
//!
//! Rules reference flat feature columns. To describe them, the columns are
//! mapped back to logical features through the [`FeatureExtractor`] and all
//! the conditions on one logical feature are rendered together, according to
//! the feature kind:
//!
//! | Kind | Rendering |
//! |------|-----------|
//! | bag | `name in {a, b} and not in {c}` |
//! | categorical | `name = a and not in {b, c}` |
//! | ordinal | `name ≥ 4`, `name ≤ 3`, or `name = bound` at the value bounds |

use crate::classes::CLASS_NOOP;
use crate::error::{FormatError, Result, ResultExt};
use crate::feature_extractor::{FEATURES_MAX, FEATURES_MIN, FeatureExtractor, FeatureKey};
use crate::features::{Feature, FeatureGroup, FeatureId};
use crate::rules::Rule;
use crate::virtual_node::VirtualNode;

/// A condition on one value of a feature: comparison, threshold, the index
/// of the value and the flat column it was read from.
type Split = (bool, f32, usize, usize);

/// Describe every rule. Fails on the first rule that cannot be described.
pub fn describe_rules(rules: &[Rule], feature_extractor: &FeatureExtractor) -> Result<Vec<String>> {
    rules
        .iter()
        .enumerate()
        .map(|(i, rule)| {
            describe_rule(rule, feature_extractor).context(format!("While describing rule {}", i))
        })
        .collect()
}

/// Describe a rule as text:
///
/// ```text
///   -1.reserved in {(}
/// 	∧ +1.length ≥ 4
/// ⇒ y = ␣
/// Confidence: 0.950. Support: 13.
/// ```
pub fn describe_rule(rule: &Rule, feature_extractor: &FeatureExtractor) -> Result<String> {
    if !feature_extractor.is_fitted() {
        return Err(FormatError::NotFitted);
    }
    let attr_descriptions = describe_rule_attrs(rule, feature_extractor)?;
    let label = feature_extractor.label_representation(rule.stats.cls as usize)?;
    Ok(format!(
        "  {}\n⇒ y = {}\nConfidence: {:.3}. Support: {}.",
        attr_descriptions.join("\n\t∧ "),
        label,
        rule.stats.conf,
        rule.stats.support
    ))
}

/// Describe the conditions of a rule, one string per logical feature.
///
/// Conditions are grouped by feature group, then node position, then
/// feature identifier; each level keeps the order of first appearance.
pub fn describe_rule_attrs(
    rule: &Rule,
    feature_extractor: &FeatureExtractor,
) -> Result<Vec<String>> {
    if !feature_extractor.is_fitted() {
        return Err(FormatError::NotFitted);
    }

    let mut grouped: Vec<(FeatureGroup, Vec<(usize, Vec<(FeatureId, Vec<Split>)>)>)> = Vec::new();
    for attr in &rule.attrs {
        let location = feature_extractor.location(attr.feature as usize)?;
        let nodes = entry(&mut grouped, location.group);
        let feature_ids = entry(nodes, location.node_index);
        let splits = entry(feature_ids, location.feature_id);
        splits.push((attr.cmp, attr.threshold, location.index, attr.feature as usize));
    }

    let mut descriptions = Vec::new();
    for (group, nodes) in &grouped {
        for (node_index, feature_ids) in nodes {
            for (feature_id, splits) in feature_ids {
                let key = FeatureKey::new(*group, *node_index, *feature_id);
                let feature = feature_extractor.feature(&key)?;
                descriptions.push(describe_rule_splits(feature, &key.display_name(), splits)?);
            }
        }
    }
    Ok(descriptions)
}

/// Find the value stored under `key`, appending a default one if missing.
fn entry<K: PartialEq, V: Default>(entries: &mut Vec<(K, V)>, key: K) -> &mut V {
    let position = match entries.iter().position(|(k, _)| *k == key) {
        Some(position) => position,
        None => {
            entries.push((key, V::default()));
            entries.len() - 1
        }
    };
    &mut entries[position].1
}

/// Split the value names referenced by `splits` into those required
/// (`cmp` set) and those excluded. Duplicates are dropped.
fn partition_names<'a>(
    names: &'a [String],
    splits: &[Split],
) -> Result<(Vec<&'a str>, Vec<&'a str>)> {
    let mut included = Vec::new();
    let mut excluded = Vec::new();
    for &(cmp, _, index, column) in splits {
        let name = names
            .get(index)
            .map(String::as_str)
            .ok_or(FormatError::UnknownFeatureIndex(column))?;
        let target = if cmp { &mut included } else { &mut excluded };
        if !target.contains(&name) {
            target.push(name);
        }
    }
    Ok((included, excluded))
}

fn describe_rule_splits(feature: &Feature, name: &str, splits: &[Split]) -> Result<String> {
    let description = match feature {
        Feature::Bag(_) => {
            let (included, excluded) = partition_names(feature.names(), splits)?;
            let mut description = name.to_string();
            if !included.is_empty() {
                description.push_str(&format!(" in {{{}}}", included.join(", ")));
                if !excluded.is_empty() {
                    description.push_str(" and");
                }
            }
            if !excluded.is_empty() {
                description.push_str(&format!(" not in {{{}}}", excluded.join(", ")));
            }
            description
        }
        Feature::Categorical(_) => {
            let (included, excluded) = partition_names(feature.names(), splits)?;
            // a one-hot feature has a single positive value; the last one wins
            let included = included.last().filter(|value| !value.is_empty());
            let mut description = name.to_string();
            if let Some(value) = included {
                description.push_str(&format!(" = {}", value));
                if !excluded.is_empty() {
                    description.push_str(" and");
                }
            }
            if !excluded.is_empty() {
                description.push_str(&format!(" not in {{{}}}", excluded.join(", ")));
            }
            description
        }
        Feature::Ordinal(_) => match splits.first() {
            Some(&(cmp, threshold, _, _)) => describe_ordinal(name, cmp, threshold),
            None => name.to_string(),
        },
    };
    Ok(description)
}

fn describe_ordinal(name: &str, cmp: bool, threshold: f32) -> String {
    let threshold = f64::from(threshold);
    if cmp {
        if threshold > (FEATURES_MAX - 1) as f64 {
            return format!("{} = {}", name, FEATURES_MAX);
        }
        return format!("{} ≥ {}", name, threshold.ceil() as i64);
    }
    if threshold < (FEATURES_MIN + 1) as f64 {
        return format!("{} = {}", name, FEATURES_MIN);
    }
    format!("{} ≤ {}", name, threshold.floor() as i64)
}

/// Describe the values a sample has for one feature, without rule context.
///
/// `values` are the sample's columns belonging to the feature, in the order
/// of the feature's selected names.
pub fn describe_sample(feature: &Feature, values: &[f32]) -> String {
    let selected_names = feature.selected_names();
    if selected_names.is_empty() {
        return "unselected".to_string();
    }
    let mut active = values
        .iter()
        .enumerate()
        .filter(|(_, value)| **value != 0.0)
        .map(|(index, _)| selected_names.get(index).copied().unwrap_or("?"));

    match feature {
        Feature::Bag(_) => {
            let active: Vec<&str> = active.collect();
            if active.is_empty() {
                "∅".to_string()
            } else {
                format!("{{{}}}", active.join(", "))
            }
        }
        Feature::Categorical(_) => active.next().unwrap_or("∅").to_string(),
        Feature::Ordinal(_) => values
            .first()
            .map_or_else(|| "∅".to_string(), |value| value.to_string()),
    }
}

/// Explain the change suggested for a node: an insertion, a removal or a
/// replacement of its formatting, with the column where it happens.
pub fn get_change_description(
    vnode: &VirtualNode,
    feature_extractor: &FeatureExtractor,
) -> Result<String> {
    let y_old = vnode.y_old.as_deref().ok_or_else(|| {
        FormatError::Validation("y_old attribute must exist in the supplied vnode".to_string())
    })?;
    let y = vnode.y.as_deref().ok_or_else(|| {
        FormatError::Validation("y attribute must exist in the supplied vnode".to_string())
    })?;
    let column = vnode.start.col;
    let old_label =
        feature_extractor.label_representation(feature_extractor.class_sequence_to_label(y_old)?)?;
    let new_label =
        feature_extractor.label_representation(feature_extractor.class_sequence_to_label(y)?)?;

    if y.first() == Some(&CLASS_NOOP) {
        return Ok(format!("{} at column {} should be removed.", old_label, column));
    }
    if y_old.first() == Some(&CLASS_NOOP) {
        return Ok(format!("{} should be inserted at column {}.", new_label, column));
    }
    Ok(format!(
        "Replace {} with {} at column {}.",
        old_label, new_label, column
    ))
}

/// Render the code around a line for a review comment: the line and the two
/// before it, each as `number|content`.
pub fn get_code_chunk<S: AsRef<str>>(code_lines: &[S], line_number: usize) -> Result<String> {
    let lines = (line_number.saturating_sub(2)..=line_number)
        .map(|line| {
            code_lines
                .get(line)
                .map(|content| format!("{}|{}", line, content.as_ref()))
                .ok_or(FormatError::LineOutOfRange {
                    line,
                    len: code_lines.len(),
                })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(lines.join("\n"))
}

/// Wrap a rule description into a review comment.
pub fn rule_to_comment(
    rule: &Rule,
    feature_extractor: &FeatureExtractor,
    number: Option<usize>,
) -> Result<String> {
    let number = number.map_or_else(|| "<NA>".to_string(), |n| n.to_string());
    Ok(format!(
        "Triggered rule # {}:\n```\n\t{}\n```",
        number,
        describe_rule(rule, feature_extractor)?
    ))
}
