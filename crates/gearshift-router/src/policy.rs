// SPDX-FileCopyrightText: 2026 Gearshift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Static per-model routing policy.
//!
//! Loaded once at startup and never mutated by requests. Entries are kept in
//! `(priority, id)` order so evaluation is a deterministic total order.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use tracing::warn;

use gearshift_config::model::{DegradationConfig, ModelPolicyConfig};
use gearshift_core::{ClassificationResult, GearshiftError, ModelId, OperationCategory};

/// Constraints under which a model may replace the requested one.
#[derive(Debug, Clone, PartialEq)]
pub struct DegradationRules {
    pub max_latency_ms: u64,
    pub min_tokens: u64,
    pub max_tokens: u64,
    pub preferred_categories: BTreeSet<OperationCategory>,
}

impl DegradationRules {
    /// Whether a request with this classification may be served by a model
    /// whose current mean latency is `mean_latency_ms`.
    ///
    /// An infinite latency (no samples) never satisfies the ceiling.
    pub fn admits(&self, classification: &ClassificationResult, mean_latency_ms: f64) -> bool {
        self.preferred_categories.contains(&classification.category)
            && (self.min_tokens..=self.max_tokens).contains(&classification.token_count)
            && mean_latency_ms <= self.max_latency_ms as f64
    }
}

/// Routing policy for one model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPolicy {
    pub id: ModelId,
    /// Lower is preferred.
    pub priority: u32,
    pub average_latency_ms: u64,
    pub cost_per_token: f64,
    pub context_window: u64,
    pub best_for: Vec<String>,
    pub degradation: Option<DegradationRules>,
}

impl ModelPolicy {
    /// Build a policy from its configuration entry.
    ///
    /// Returns `ConfigMalformed` for a blank id, a negative or non-finite
    /// cost, an inverted token range, or an unrecognized preferred category.
    pub fn from_config(id: &str, config: &ModelPolicyConfig) -> Result<Self, GearshiftError> {
        let malformed = |message: String| GearshiftError::ConfigMalformed {
            message: format!("model `{id}`: {message}"),
        };

        if id.trim().is_empty() {
            return Err(malformed("model id must not be blank".to_string()));
        }
        if !config.cost_per_token.is_finite() || config.cost_per_token < 0.0 {
            return Err(malformed(format!(
                "cost_per_token {} must be a non-negative number",
                config.cost_per_token
            )));
        }

        let degradation = config
            .degradation
            .as_ref()
            .map(parse_degradation)
            .transpose()
            .map_err(malformed)?;

        Ok(Self {
            id: ModelId::new(id),
            priority: config.priority,
            average_latency_ms: config.average_latency_ms,
            cost_per_token: config.cost_per_token,
            context_window: config.context_window,
            best_for: config.best_for.clone(),
            degradation,
        })
    }
}

fn parse_degradation(config: &DegradationConfig) -> Result<DegradationRules, String> {
    if config.min_tokens > config.max_tokens {
        return Err(format!(
            "min_tokens {} exceeds max_tokens {}",
            config.min_tokens, config.max_tokens
        ));
    }

    let mut preferred_categories = BTreeSet::new();
    for name in &config.preferred_categories {
        match OperationCategory::from_str(name.trim()) {
            Ok(OperationCategory::Unknown) | Err(_) => {
                return Err(format!("unrecognized preferred category `{name}`"));
            }
            Ok(category) => {
                preferred_categories.insert(category);
            }
        }
    }

    Ok(DegradationRules {
        max_latency_ms: config.max_latency_ms,
        min_tokens: config.min_tokens,
        max_tokens: config.max_tokens,
        preferred_categories,
    })
}

/// The ordered policy table.
#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    policies: Vec<ModelPolicy>,
}

impl PolicyTable {
    /// Build a table from already-parsed policies, ordering by `(priority, id)`.
    pub fn new(mut policies: Vec<ModelPolicy>) -> Self {
        policies.sort_by(|a, b| (a.priority, &a.id).cmp(&(b.priority, &b.id)));
        Self { policies }
    }

    /// Build a table from configuration. A malformed entry is skipped with a
    /// warning and does not affect the others.
    pub fn from_config(models: &BTreeMap<String, ModelPolicyConfig>) -> Self {
        let policies = models
            .iter()
            .filter_map(|(id, config)| match ModelPolicy::from_config(id, config) {
                Ok(policy) => Some(policy),
                Err(e) => {
                    warn!(model = id.as_str(), error = %e, "skipping malformed model policy");
                    None
                }
            })
            .collect();
        Self::new(policies)
    }

    /// Policies in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = &ModelPolicy> {
        self.policies.iter()
    }

    pub fn get(&self, id: &ModelId) -> Option<&ModelPolicy> {
        self.policies.iter().find(|p| &p.id == id)
    }

    /// Model ids in evaluation order.
    pub fn model_ids(&self) -> Vec<ModelId> {
        self.policies.iter().map(|p| p.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gearshift_config::model::builtin_models;

    fn entry(priority: u32, degradation: Option<DegradationConfig>) -> ModelPolicyConfig {
        ModelPolicyConfig {
            priority,
            average_latency_ms: 0,
            cost_per_token: 0.0001,
            context_window: 32_000,
            best_for: vec![],
            degradation,
        }
    }

    fn rules(min: u64, max: u64, categories: &[&str]) -> DegradationConfig {
        DegradationConfig {
            max_latency_ms: 1_000,
            min_tokens: min,
            max_tokens: max,
            preferred_categories: categories.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn builtin_table_orders_by_priority() {
        let table = PolicyTable::from_config(&builtin_models());
        let ids: Vec<String> = table.iter().map(|p| p.id.to_string()).collect();
        assert_eq!(
            ids,
            vec!["claude-3.7-sonnet", "gemini-2.5-pro", "claude-3.5-sonnet"]
        );
        let gemini = table.get(&ModelId::new("gemini-2.5-pro")).unwrap();
        let rules = gemini.degradation.as_ref().unwrap();
        assert_eq!((rules.min_tokens, rules.max_tokens), (50, 4_000));
        assert!(rules.preferred_categories.contains(&OperationCategory::Rename));
    }

    #[test]
    fn equal_priority_breaks_ties_by_id() {
        let mut models = BTreeMap::new();
        models.insert("zeta".to_string(), entry(1, None));
        models.insert("alpha".to_string(), entry(1, None));
        models.insert("first".to_string(), entry(0, None));
        let table = PolicyTable::from_config(&models);
        assert_eq!(
            table.model_ids(),
            vec![ModelId::new("first"), ModelId::new("alpha"), ModelId::new("zeta")]
        );
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let mut models = BTreeMap::new();
        models.insert("good".to_string(), entry(1, Some(rules(0, 50, &["rename"]))));
        models.insert("inverted".to_string(), entry(2, Some(rules(500, 10, &["rename"]))));
        models.insert("bad-category".to_string(), entry(3, Some(rules(0, 10, &["poetry"]))));
        models.insert("unknown-category".to_string(), entry(3, Some(rules(0, 10, &["unknown"]))));
        let mut negative = entry(4, None);
        negative.cost_per_token = -1.0;
        models.insert("negative".to_string(), negative);
        models.insert("  ".to_string(), entry(5, None));

        let table = PolicyTable::from_config(&models);
        assert_eq!(table.len(), 1);
        assert_eq!(table.model_ids(), vec![ModelId::new("good")]);
    }

    #[test]
    fn admits_checks_every_constraint() {
        let rules = parse_degradation(&rules(0, 50, &["rename", "syntax"])).unwrap();
        let ok = ClassificationResult {
            category: OperationCategory::Rename,
            token_count: 50,
        };
        assert!(rules.admits(&ok, 1_000.0));
        assert!(!rules.admits(&ok, 1_000.5));
        assert!(!rules.admits(&ok, f64::INFINITY));
        assert!(!rules.admits(
            &ClassificationResult {
                token_count: 51,
                ..ok
            },
            10.0
        ));
        assert!(!rules.admits(
            &ClassificationResult {
                category: OperationCategory::Refactor,
                ..ok
            },
            10.0
        ));
        assert!(!rules.admits(&ClassificationResult::UNKNOWN, 10.0));
    }

    #[test]
    fn category_names_are_case_insensitive() {
        let rules = parse_degradation(&rules(0, 10, &[" Rename ", "SYNTAX"])).unwrap();
        assert_eq!(rules.preferred_categories.len(), 2);
    }
}
