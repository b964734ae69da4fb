// SPDX-FileCopyrightText: 2026 Gearshift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operation classification and model selection for Gearshift.
//!
//! This crate provides:
//! - [`OperationClassifier`]: ordered-rule category classification and token estimates
//! - [`MetricsStore`]: rolling per-model latency samples
//! - [`PolicyTable`]: the static per-model degradation policy
//! - [`ModelRouter`]: the decision core that picks the model for each request
//!
//! The router never rejects a request. When nothing qualifies, or anything
//! fails, the caller's requested model is returned unchanged.

pub mod classifier;
pub mod latency;
pub mod policy;
pub mod router;
pub mod telemetry;

pub use classifier::{estimate_tokens, Classify, OperationClassifier, DEFAULT_CATEGORY};
pub use latency::MetricsStore;
pub use policy::{DegradationRules, ModelPolicy, PolicyTable};
pub use router::{ModelRouter, DEFAULT_USER_STATE_TIMEOUT};
pub use telemetry::{register_metrics, TracingDecisionSink};
