//! Activation/Trace Mapper
//!
//! Turns a flat computation trace into a lookup keyed by layer id so the
//! renderer can highlight layers and show their statistics.
//!
//! A layer invoked several times (shared modules, loops) appears more than
//! once in a trace. The map keeps only the most recent step for such ids:
//! last write wins, in trace order.

use crate::model::ComputationStep;
use std::collections::HashMap;

/// Lookup from layer id to its most recent trace step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivationMap<'a> {
    steps: HashMap<&'a str, &'a ComputationStep>,
}

impl<'a> ActivationMap<'a> {
    /// Build the lookup from a trace
    pub fn build(trace: &'a [ComputationStep]) -> Self {
        let mut steps = HashMap::with_capacity(trace.len());
        for step in trace {
            steps.insert(step.layer_id.as_str(), step);
        }
        Self { steps }
    }

    pub fn get(&self, layer_id: &str) -> Option<&'a ComputationStep> {
        self.steps.get(layer_id).copied()
    }

    pub fn contains(&self, layer_id: &str) -> bool {
        self.steps.contains_key(layer_id)
    }

    /// Number of distinct layer ids in the trace
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Highlight strength for a layer (0 when it has no step or no stats)
    pub fn intensity(&self, layer_id: &str) -> f32 {
        self.get(layer_id).map(highlight_intensity).unwrap_or(0.0)
    }
}

/// Emissive strength for a traced layer: `min(1, |mean| * 2)`
pub fn highlight_intensity(step: &ComputationStep) -> f32 {
    match &step.activation_stats {
        Some(stats) if stats.mean.is_finite() => (stats.mean.abs() * 2.0).min(1.0) as f32,
        _ => 0.0,
    }
}
