// SPDX-FileCopyrightText: 2026 Gearshift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rolling per-model latency samples.
//!
//! A point-in-time health signal, not a historical record: nothing is
//! persisted across restarts.

use std::collections::{BTreeMap, VecDeque};

use dashmap::DashMap;
use tracing::debug;

use gearshift_config::model::MetricsConfig;
use gearshift_core::ModelId;

/// Bounded FIFO of samples with a running sum.
#[derive(Debug, Default)]
struct LatencyWindow {
    samples: VecDeque<u64>,
    // Wide enough that no window of u64 samples can overflow.
    sum: u128,
}

impl LatencyWindow {
    fn push(&mut self, ms: u64, capacity: usize) {
        self.samples.push_back(ms);
        self.sum += u128::from(ms);
        while self.samples.len() > capacity {
            if let Some(evicted) = self.samples.pop_front() {
                self.sum -= u128::from(evicted);
            }
        }
    }

    fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            f64::INFINITY
        } else {
            self.sum as f64 / self.samples.len() as f64
        }
    }
}

/// Per-model latency store.
///
/// Appends for one model are serialized by the map's shard lock; reads take
/// a shared lock only long enough to compute the mean.
pub struct MetricsStore {
    windows: DashMap<ModelId, LatencyWindow>,
    capacity: usize,
}

impl MetricsStore {
    /// Create a store keeping at most `capacity` samples per model.
    pub fn new(capacity: usize) -> Self {
        Self {
            windows: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn from_config(config: &MetricsConfig) -> Self {
        Self::new(config.max_samples)
    }

    /// Record one observed latency, evicting the oldest sample past capacity.
    pub fn record_latency(&self, model: &ModelId, ms: u64) {
        self.windows
            .entry(model.clone())
            .or_default()
            .push(ms, self.capacity);
        metrics::histogram!("gearshift_model_latency_ms", "model" => model.to_string())
            .record(ms as f64);
        debug!(model = %model, latency_ms = ms, "recorded model latency");
    }

    /// Mean latency for `model`, or infinity when it has no samples.
    pub fn mean_latency(&self, model: &ModelId) -> f64 {
        self.windows
            .get(model)
            .map(|window| window.mean())
            .unwrap_or(f64::INFINITY)
    }

    /// Mean latency for each of `models`. Unsampled models report infinity.
    pub fn get_latencies(&self, models: &[ModelId]) -> BTreeMap<ModelId, f64> {
        models
            .iter()
            .map(|model| (model.clone(), self.mean_latency(model)))
            .collect()
    }

    /// The model with the lowest mean latency.
    ///
    /// Ties go to the earlier model in `models`, so an unsampled model only
    /// wins when nothing in the list has samples.
    pub fn fastest(&self, models: &[ModelId]) -> Option<ModelId> {
        let mut best: Option<(&ModelId, f64)> = None;
        for model in models {
            let mean = self.mean_latency(model);
            match best {
                Some((_, best_mean)) if mean >= best_mean => {}
                _ => best = Some((model, mean)),
            }
        }
        best.map(|(model, _)| model.clone())
    }

    pub fn sample_count(&self, model: &ModelId) -> usize {
        self.windows
            .get(model)
            .map(|window| window.samples.len())
            .unwrap_or(0)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for MetricsStore {
    fn default() -> Self {
        Self::from_config(&MetricsConfig::default())
    }
}
