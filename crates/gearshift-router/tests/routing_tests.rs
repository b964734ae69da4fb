// SPDX-FileCopyrightText: 2026 Gearshift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routing driven end to end from a TOML policy table.

use std::sync::Arc;

use gearshift_config::load_and_validate_str;
use gearshift_core::{ModelId, RouteRequest, RoutingOutcome};
use gearshift_router::{MetricsStore, ModelRouter, OperationClassifier, PolicyTable};
use gearshift_test_utils::{RecordingSink, StaticUserState};

const POLICY: &str = r#"
[metrics]
max_samples = 5

[models.flagship]
priority = 1

[models.docs-helper]
priority = 2
[models.docs-helper.degradation]
max_latency_ms = 800
min_tokens = 0
max_tokens = 200
preferred_categories = ["documentation"]

[models.quick-fix]
priority = 3
[models.quick-fix.degradation]
max_latency_ms = 800
min_tokens = 0
max_tokens = 200
preferred_categories = ["documentation", "syntax", "rename"]

[models.broken]
priority = 0
[models.broken.degradation]
max_latency_ms = 800
min_tokens = 300
max_tokens = 100
preferred_categories = ["syntax"]

[[classifier.extra_rules]]
category = "syntax"
pattern = "(?i)\\btidy\\b"
"#;

fn build() -> (ModelRouter, Arc<MetricsStore>, Arc<RecordingSink>) {
    let config = load_and_validate_str(POLICY).expect("policy config is valid");
    let metrics = Arc::new(MetricsStore::from_config(&config.metrics));
    let sink = Arc::new(RecordingSink::new());
    let router = ModelRouter::new(
        config.routing.clone(),
        PolicyTable::from_config(&config.models_or_builtin()),
        Arc::clone(&metrics),
        Arc::new(StaticUserState::privileged(0)),
    )
    .with_classifier(Arc::new(OperationClassifier::from_config(&config.classifier)))
    .with_sink(sink.clone());
    (router, metrics, sink)
}

#[tokio::test]
async fn malformed_entry_is_skipped_and_others_route() {
    let (router, metrics, _) = build();
    assert_eq!(router.policies().len(), 3);
    assert!(router.policies().get(&ModelId::new("broken")).is_none());

    metrics.record_latency(&ModelId::new("quick-fix"), 200);
    let request = RouteRequest::new("flagship").with_prompt("tidy up this block");
    assert_eq!(router.route(&request).await, ModelId::new("quick-fix"));
}

#[tokio::test]
async fn first_admitting_model_by_priority_wins() {
    let (router, metrics, sink) = build();
    metrics.record_latency(&ModelId::new("docs-helper"), 500);
    metrics.record_latency(&ModelId::new("quick-fix"), 100);

    let request = RouteRequest::new("flagship").with_prompt("write a docstring for parse()");
    assert_eq!(router.route(&request).await, ModelId::new("docs-helper"));

    // The latency window is capped at five samples, so five slow samples
    // push docs-helper over its ceiling.
    for _ in 0..5 {
        metrics.record_latency(&ModelId::new("docs-helper"), 900);
    }
    assert_eq!(router.route(&request).await, ModelId::new("quick-fix"));

    let outcomes: Vec<_> = sink.decisions().iter().map(|d| d.outcome).collect();
    assert_eq!(outcomes, vec![RoutingOutcome::Degraded, RoutingOutcome::Degraded]);
}
