// SPDX-FileCopyrightText: 2026 Gearshift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and routing-decision telemetry.
//!
//! Uses the metrics-rs facade so any recorder (Prometheus, statsd, etc.)
//! installed by the host can collect these metrics.

use metrics::{describe_counter, describe_histogram, Unit};
use tracing::info;

use gearshift_core::{DecisionSink, RoutingDecision};

/// Register all Gearshift metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "gearshift_routing_decisions_total",
        "Routing decisions by outcome and operation category"
    );
    describe_counter!(
        "gearshift_quota_signals_total",
        "Quota-exceeded replies from the account service"
    );
    describe_counter!(
        "gearshift_credential_rotations_total",
        "Credential rotations by result"
    );
    describe_histogram!(
        "gearshift_model_latency_ms",
        Unit::Milliseconds,
        "Observed model latency"
    );
}

/// Count a routing decision.
pub fn record_decision(decision: &RoutingDecision) {
    metrics::counter!(
        "gearshift_routing_decisions_total",
        "outcome" => decision.outcome.to_string(),
        "category" => decision.category.to_string()
    )
    .increment(1);
}

/// Default decision sink: one structured log line and a counter per decision.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDecisionSink;

impl DecisionSink for TracingDecisionSink {
    fn record(&self, decision: &RoutingDecision) {
        info!(
            original = %decision.original_model,
            selected = %decision.selected_model,
            category = %decision.category,
            outcome = %decision.outcome,
            reason = decision.reason.as_str(),
            "routing decision"
        );
        record_decision(decision);
    }
}
