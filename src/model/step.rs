//! Computation trace types
//!
//! A trace is an ordered sequence of `ComputationStep`s in execution order,
//! which is not necessarily layer-tree order.

use serde::{Deserialize, Serialize};

/// Summary statistics of a layer's activation tensor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivationStats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

/// Heatmap data captured for a step (flat or 2-D)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Heatmap {
    Flat(Vec<f64>),
    Grid(Vec<Vec<f64>>),
}

/// One recorded execution event tied to a layer id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputationStep {
    /// Position in the trace (0-based)
    pub step_index: usize,

    /// Reference to a `LayerNode::id` (not an ownership relation)
    pub layer_id: String,

    pub layer_name: String,

    pub operation: String,

    #[serde(default)]
    pub input_shape: Vec<usize>,

    #[serde(default)]
    pub output_shape: Vec<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation_stats: Option<ActivationStats>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heatmap: Option<Heatmap>,

    /// Base64 PNG of the feature map, passed through undecoded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_map_image: Option<String>,
}

impl ComputationStep {
    pub fn new(step_index: usize, layer_id: impl Into<String>, layer_name: impl Into<String>) -> Self {
        Self {
            step_index,
            layer_id: layer_id.into(),
            layer_name: layer_name.into(),
            operation: String::new(),
            input_shape: Vec::new(),
            output_shape: Vec::new(),
            activation_stats: None,
            heatmap: None,
            feature_map_image: None,
        }
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = operation.into();
        self
    }

    pub fn with_stats(mut self, stats: ActivationStats) -> Self {
        self.activation_stats = Some(stats);
        self
    }
}

/// Result of an inference run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    #[serde(default)]
    pub model_name: String,

    #[serde(default)]
    pub input_shape: Vec<usize>,

    #[serde(default)]
    pub output_shape: Vec<usize>,

    /// Base64 input image, passed through undecoded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_image: Option<String>,

    #[serde(default)]
    pub steps: Vec<ComputationStep>,
}
