// SPDX-FileCopyrightText: 2026 Gearshift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Model selection under a declarative degradation policy.
//!
//! Orchestrates: enabled switch > tier check > quota gate > classify >
//! latency lookup > first qualifying policy by priority. Every failure falls
//! back to the requested model; routing never rejects a request.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use gearshift_config::model::RoutingConfig;
use gearshift_core::{
    ClassificationResult, DecisionSink, GearshiftError, ModelId, OperationCategory, RouteRequest,
    RoutingDecision, RoutingOutcome, UserStateSource,
};

use crate::classifier::{Classify, OperationClassifier};
use crate::latency::MetricsStore;
use crate::policy::PolicyTable;
use crate::telemetry::TracingDecisionSink;

/// Upper bound on waiting for the user state before passing through.
pub const DEFAULT_USER_STATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of the selection steps, before it is stamped into a decision.
struct Selection {
    selected: Option<ModelId>,
    category: OperationCategory,
    outcome: RoutingOutcome,
    reason: String,
}

impl Selection {
    fn pass_through(
        outcome: RoutingOutcome,
        category: OperationCategory,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            selected: None,
            category,
            outcome,
            reason: reason.into(),
        }
    }
}

/// Chooses the model that services each request.
pub struct ModelRouter {
    classifier: Arc<dyn Classify>,
    metrics: Arc<MetricsStore>,
    policies: PolicyTable,
    user_state: Arc<dyn UserStateSource>,
    sink: Arc<dyn DecisionSink>,
    config: RoutingConfig,
    user_state_timeout: Duration,
}

impl ModelRouter {
    /// Create a router with the built-in classifier and the tracing sink.
    pub fn new(
        config: RoutingConfig,
        policies: PolicyTable,
        metrics: Arc<MetricsStore>,
        user_state: Arc<dyn UserStateSource>,
    ) -> Self {
        Self {
            classifier: Arc::new(OperationClassifier::new()),
            metrics,
            policies,
            user_state,
            sink: Arc::new(TracingDecisionSink),
            config,
            user_state_timeout: DEFAULT_USER_STATE_TIMEOUT,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn Classify>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn DecisionSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_user_state_timeout(mut self, timeout: Duration) -> Self {
        self.user_state_timeout = timeout;
        self
    }

    pub fn user_state_timeout(&self) -> Duration {
        self.user_state_timeout
    }

    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    pub fn metrics(&self) -> &Arc<MetricsStore> {
        &self.metrics
    }

    /// Route a request and return the model that should service it.
    pub async fn route(&self, request: &RouteRequest) -> ModelId {
        self.decide(request).await.selected_model
    }

    /// Route a request and return the full decision.
    ///
    /// The decision is delivered to the sink whatever the outcome,
    /// pass-through included.
    pub async fn decide(&self, request: &RouteRequest) -> RoutingDecision {
        let selection = match self.select(request).await {
            Ok(selection) => selection,
            Err(e) => {
                warn!(model = %request.model, error = %e, "routing failed, passing through");
                Selection::pass_through(
                    RoutingOutcome::Failed,
                    OperationCategory::Unknown,
                    format!("routing failed: {e}"),
                )
            }
        };

        let decision = RoutingDecision {
            original_model: request.model.clone(),
            selected_model: selection
                .selected
                .unwrap_or_else(|| request.model.clone()),
            category: selection.category,
            outcome: selection.outcome,
            reason: selection.reason,
            timestamp: Utc::now(),
        };
        self.sink.record(&decision);
        decision
    }

    async fn select(&self, request: &RouteRequest) -> Result<Selection, GearshiftError> {
        if !self.config.enabled {
            return Ok(Selection::pass_through(
                RoutingOutcome::Disabled,
                OperationCategory::Unknown,
                "routing disabled",
            ));
        }

        let state = tokio::time::timeout(self.user_state_timeout, self.user_state.user_state())
            .await
            .map_err(|_| GearshiftError::Timeout {
                duration: self.user_state_timeout,
            })?;

        if !state.is_privileged {
            return Ok(Selection::pass_through(
                RoutingOutcome::Unprivileged,
                OperationCategory::Unknown,
                "caller is not on a privileged tier",
            ));
        }

        if self.config.pass_through_while_quota_remains && state.fast_quota_remaining > 0 {
            return Ok(Selection::pass_through(
                RoutingOutcome::QuotaAvailable,
                OperationCategory::Unknown,
                format!("{} fast requests remain", state.fast_quota_remaining),
            ));
        }

        let classification = self.classifier.classify_request(request);
        Ok(self.evaluate(&classification))
    }

    /// Walk the policy table in priority order; the first admitting model wins.
    fn evaluate(&self, classification: &ClassificationResult) -> Selection {
        let latencies = self.metrics.get_latencies(&self.policies.model_ids());

        for policy in self.policies.iter() {
            let Some(rules) = &policy.degradation else {
                continue;
            };
            let latency = latencies
                .get(&policy.id)
                .copied()
                .unwrap_or(f64::INFINITY);
            if rules.admits(classification, latency) {
                return Selection {
                    selected: Some(policy.id.clone()),
                    category: classification.category,
                    outcome: RoutingOutcome::Degraded,
                    reason: format!(
                        "{} operation of {} tokens fits {} (mean latency {latency:.0}ms)",
                        classification.category, classification.token_count, policy.id
                    ),
                };
            }
            debug!(
                model = %policy.id,
                category = %classification.category,
                tokens = classification.token_count,
                latency_ms = latency,
                "policy does not admit request"
            );
        }

        Selection::pass_through(
            RoutingOutcome::NoCandidate,
            classification.category,
            format!(
                "no model admits a {} operation of {} tokens",
                classification.category, classification.token_count
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use gearshift_config::model::{DegradationConfig, ModelPolicyConfig, builtin_models};
    use gearshift_core::UserState;
    use gearshift_test_utils::{RecordingSink, StaticUserState};
    use proptest::prelude::*;

    use super::*;

    /// Wraps the real classifier and counts calls.
    #[derive(Default)]
    struct CountingClassifier {
        inner: OperationClassifier,
        calls: AtomicUsize,
    }

    impl Classify for CountingClassifier {
        fn classify(&self, content: &str) -> ClassificationResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.classify(content)
        }
    }

    struct StalledUserState;

    #[async_trait]
    impl UserStateSource for StalledUserState {
        async fn user_state(&self) -> UserState {
            tokio::time::sleep(Duration::from_secs(3_600)).await;
            UserState::default()
        }
    }

    fn policy(priority: u32, max_tokens: u64, categories: &[&str]) -> ModelPolicyConfig {
        ModelPolicyConfig {
            priority,
            average_latency_ms: 0,
            cost_per_token: 0.0001,
            context_window: 32_000,
            best_for: vec![],
            degradation: Some(DegradationConfig {
                max_latency_ms: 2_000,
                min_tokens: 0,
                max_tokens,
                preferred_categories: categories.iter().map(|s| s.to_string()).collect(),
            }),
        }
    }

    struct Harness {
        router: ModelRouter,
        metrics: Arc<MetricsStore>,
        classifier: Arc<CountingClassifier>,
        sink: Arc<RecordingSink>,
    }

    fn harness(
        models: BTreeMap<String, ModelPolicyConfig>,
        state: StaticUserState,
        config: RoutingConfig,
    ) -> Harness {
        let metrics = Arc::new(MetricsStore::new(100));
        let classifier = Arc::new(CountingClassifier::default());
        let sink = Arc::new(RecordingSink::new());
        let router = ModelRouter::new(
            config,
            PolicyTable::from_config(&models),
            Arc::clone(&metrics),
            Arc::new(state),
        )
        .with_classifier(classifier.clone())
        .with_sink(sink.clone());
        Harness {
            router,
            metrics,
            classifier,
            sink,
        }
    }

    fn rename_models() -> BTreeMap<String, ModelPolicyConfig> {
        let mut models = BTreeMap::new();
        models.insert("big-model".to_string(), ModelPolicyConfig {
            degradation: None,
            ..policy(1, 0, &[])
        });
        models.insert("rename-model".to_string(), policy(2, 50, &["rename"]));
        models
    }

    #[tokio::test]
    async fn rename_comment_routes_to_rename_model() {
        let h = harness(
            rename_models(),
            StaticUserState::privileged(0),
            RoutingConfig::default(),
        );
        h.metrics.record_latency(&ModelId::new("rename-model"), 300);

        let request =
            RouteRequest::new("big-model").with_code_snippet("// simple rename of variable x to y");
        let decision = h.router.decide(&request).await;

        assert_eq!(decision.selected_model, ModelId::new("rename-model"));
        assert_eq!(decision.original_model, ModelId::new("big-model"));
        assert_eq!(decision.category, OperationCategory::Rename);
        assert_eq!(decision.outcome, RoutingOutcome::Degraded);
        assert!(!decision.is_pass_through());
    }

    #[tokio::test]
    async fn oversized_refactor_passes_through() {
        let h = harness(
            builtin_models(),
            StaticUserState::privileged(0),
            RoutingConfig::default(),
        );
        h.metrics.record_latency(&ModelId::new("gemini-2.5-pro"), 100);

        let snippet = format!("refactor {}", "token ".repeat(5_000));
        let request = RouteRequest::new("claude-3.7-sonnet").with_code_snippet(snippet);
        let decision = h.router.decide(&request).await;

        assert_eq!(decision.selected_model, ModelId::new("claude-3.7-sonnet"));
        assert_eq!(decision.outcome, RoutingOutcome::NoCandidate);
        assert_eq!(decision.category, OperationCategory::Refactor);
    }

    #[tokio::test]
    async fn unsampled_models_never_qualify() {
        let h = harness(
            rename_models(),
            StaticUserState::privileged(0),
            RoutingConfig::default(),
        );
        let request =
            RouteRequest::new("big-model").with_code_snippet("// simple rename of variable x to y");

        assert_eq!(h.router.route(&request).await, ModelId::new("big-model"));
        assert_eq!(h.sink.last().unwrap().outcome, RoutingOutcome::NoCandidate);
    }

    #[tokio::test]
    async fn slow_model_exceeds_latency_ceiling() {
        let h = harness(
            rename_models(),
            StaticUserState::privileged(0),
            RoutingConfig::default(),
        );
        h.metrics.record_latency(&ModelId::new("rename-model"), 2_001);
        let request = RouteRequest::new("big-model").with_prompt("rename foo to bar");
        assert_eq!(h.router.route(&request).await, ModelId::new("big-model"));
    }

    #[tokio::test]
    async fn lower_priority_number_wins_regardless_of_declaration() {
        let mut models = BTreeMap::new();
        // Declared first alphabetically, but lower preference.
        models.insert("aaa-second".to_string(), policy(5, 100, &["rename"]));
        models.insert("zzz-first".to_string(), policy(1, 100, &["rename"]));
        let h = harness(models, StaticUserState::privileged(0), RoutingConfig::default());
        h.metrics.record_latency(&ModelId::new("aaa-second"), 10);
        h.metrics.record_latency(&ModelId::new("zzz-first"), 1_500);

        let request = RouteRequest::new("big").with_prompt("rename this");
        assert_eq!(h.router.route(&request).await, ModelId::new("zzz-first"));
    }

    #[tokio::test]
    async fn unprivileged_caller_passes_through_without_classifying() {
        let h = harness(
            rename_models(),
            StaticUserState::unprivileged(),
            RoutingConfig::default(),
        );
        h.metrics.record_latency(&ModelId::new("rename-model"), 10);
        let request = RouteRequest::new("big-model").with_prompt("rename x");

        assert_eq!(h.router.route(&request).await, ModelId::new("big-model"));
        assert_eq!(h.classifier.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.sink.last().unwrap().outcome, RoutingOutcome::Unprivileged);
    }

    #[tokio::test]
    async fn remaining_quota_skips_classifier() {
        let h = harness(
            rename_models(),
            StaticUserState::privileged(7),
            RoutingConfig::default(),
        );
        h.metrics.record_latency(&ModelId::new("rename-model"), 10);
        let request = RouteRequest::new("big-model").with_prompt("rename x");

        let decision = h.router.decide(&request).await;
        assert!(decision.is_pass_through());
        assert_eq!(decision.outcome, RoutingOutcome::QuotaAvailable);
        assert_eq!(h.classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn quota_gate_can_be_disabled() {
        let config = RoutingConfig {
            pass_through_while_quota_remains: false,
            ..RoutingConfig::default()
        };
        let h = harness(rename_models(), StaticUserState::privileged(7), config);
        h.metrics.record_latency(&ModelId::new("rename-model"), 10);
        let request = RouteRequest::new("big-model").with_prompt("rename x");

        assert_eq!(h.router.route(&request).await, ModelId::new("rename-model"));
        assert_eq!(h.classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disabled_routing_passes_through() {
        let config = RoutingConfig {
            enabled: false,
            ..RoutingConfig::default()
        };
        let h = harness(rename_models(), StaticUserState::privileged(0), config);
        h.metrics.record_latency(&ModelId::new("rename-model"), 10);
        let request = RouteRequest::new("big-model").with_prompt("rename x");

        let decision = h.router.decide(&request).await;
        assert!(decision.is_pass_through());
        assert_eq!(decision.outcome, RoutingOutcome::Disabled);
    }

    #[tokio::test]
    async fn absent_content_passes_through() {
        let h = harness(
            rename_models(),
            StaticUserState::privileged(0),
            RoutingConfig::default(),
        );
        h.metrics.record_latency(&ModelId::new("rename-model"), 10);

        let decision = h.router.decide(&RouteRequest::new("big-model")).await;
        assert!(decision.is_pass_through());
        assert_eq!(decision.category, OperationCategory::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_user_state_fails_open() {
        let sink = Arc::new(RecordingSink::new());
        let router = ModelRouter::new(
            RoutingConfig::default(),
            PolicyTable::from_config(&rename_models()),
            Arc::new(MetricsStore::new(10)),
            Arc::new(StalledUserState),
        )
        .with_sink(sink.clone())
        .with_user_state_timeout(Duration::from_secs(2));

        let request = RouteRequest::new("big-model").with_prompt("rename x");
        let decision = router.decide(&request).await;

        assert_eq!(decision.selected_model, ModelId::new("big-model"));
        assert_eq!(decision.outcome, RoutingOutcome::Failed);
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn every_decision_reaches_the_sink() {
        let h = harness(
            rename_models(),
            StaticUserState::privileged(0),
            RoutingConfig::default(),
        );
        h.metrics.record_latency(&ModelId::new("rename-model"), 10);

        h.router.route(&RouteRequest::new("big-model").with_prompt("rename x")).await;
        h.router.route(&RouteRequest::new("big-model").with_prompt("review x")).await;
        h.router.route(&RouteRequest::new("big-model")).await;

        let outcomes: Vec<RoutingOutcome> =
            h.sink.decisions().iter().map(|d| d.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                RoutingOutcome::Degraded,
                RoutingOutcome::NoCandidate,
                RoutingOutcome::NoCandidate
            ]
        );
    }

    proptest! {
        #[test]
        fn unprivileged_requests_always_keep_their_model(
            model in "[a-z][a-z0-9.-]{0,20}",
            snippet in proptest::option::of("\\PC{0,80}"),
            prompt in proptest::option::of("\\PC{0,80}"),
            quota in 0u64..10,
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();
            let h = harness(
                rename_models(),
                StaticUserState::new(UserState {
                    is_privileged: false,
                    fast_quota_remaining: quota,
                    ..UserState::default()
                }),
                RoutingConfig::default(),
            );
            h.metrics.record_latency(&ModelId::new("rename-model"), 1);
            let request = RouteRequest {
                model: ModelId::new(model.clone()),
                code_snippet: snippet,
                prompt,
            };
            let selected = runtime.block_on(h.router.route(&request));
            prop_assert_eq!(selected, ModelId::new(model));
        }
    }
}
