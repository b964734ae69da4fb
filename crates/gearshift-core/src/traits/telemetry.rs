// SPDX-FileCopyrightText: 2026 Gearshift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sink for routing telemetry events.

use crate::types::RoutingDecision;

/// Receives one [`RoutingDecision`] per routed request, pass-through included.
///
/// Called inline on the routing path, so implementations must not block.
pub trait DecisionSink: Send + Sync + 'static {
    fn record(&self, decision: &RoutingDecision);
}
