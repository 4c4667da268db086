//! Layer tree model and traversal
//!
//! A `ModelStructure` owns its tree of `LayerNode`s exclusively and is
//! replaced wholesale on reload. All traversals here use an explicit work
//! list so pathologically deep trees cannot exhaust the call stack.

use crate::error::{Result, ViewerError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Deepest layer nesting accepted from a backend
pub const MAX_LAYER_DEPTH: usize = 512;

/// Parameter information attached to a layer
///
/// Backends send either a plain parameter count or a per-kind
/// hyper-parameter object (`{"in_channels": 3, ...}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayerParams {
    Count(i64),
    Config(serde_json::Map<String, serde_json::Value>),
}

impl LayerParams {
    /// The parameter count, if this is the counted form
    pub fn count(&self) -> Option<i64> {
        match self {
            LayerParams::Count(n) => Some(*n),
            LayerParams::Config(_) => None,
        }
    }
}

/// One operation in a model's structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerNode {
    /// Identifier, unique across the whole tree
    pub id: String,

    pub name: String,

    /// Operation kind tag (open vocabulary, e.g. "Conv2d")
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_shape: Option<Vec<usize>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_shape: Option<Vec<usize>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<LayerParams>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_params: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trainable_params: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<LayerNode>>,

    /// Nesting level as reported by the backend (informational only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
}

impl LayerNode {
    /// Create a leaf layer with no shapes or parameter data
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: kind.into(),
            input_shape: None,
            output_shape: None,
            params: None,
            total_params: None,
            trainable_params: None,
            children: None,
            depth: None,
        }
    }

    pub fn with_total_params(mut self, total: i64) -> Self {
        self.total_params = Some(total);
        self
    }

    pub fn with_shapes(mut self, input: Vec<usize>, output: Vec<usize>) -> Self {
        self.input_shape = Some(input);
        self.output_shape = Some(output);
        self
    }

    pub fn with_children(mut self, children: Vec<LayerNode>) -> Self {
        self.children = Some(children);
        self
    }

    /// Child layers (empty slice for leaves)
    pub fn children(&self) -> &[LayerNode] {
        self.children.as_deref().unwrap_or(&[])
    }

    /// Parameter count used for display and box sizing
    ///
    /// First non-zero of `total_params` and a counted `params`.
    pub fn param_count(&self) -> Option<i64> {
        self.total_params
            .filter(|n| *n != 0)
            .or_else(|| self.params.as_ref().and_then(LayerParams::count).filter(|n| *n != 0))
    }
}

impl Drop for LayerNode {
    // Flatten the subtree first so dropping a deep chain does not recurse.
    fn drop(&mut self) {
        let mut pending = self.children.take().unwrap_or_default();
        while let Some(mut node) = pending.pop() {
            if let Some(children) = node.children.take() {
                pending.extend(children);
            }
        }
    }
}

/// The full named tree of layers plus aggregate parameter counts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStructure {
    #[serde(alias = "model_name")]
    pub name: String,

    #[serde(default)]
    pub total_params: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trainable_params: Option<i64>,

    #[serde(default)]
    pub layers: Vec<LayerNode>,
}

impl ModelStructure {
    pub fn new(name: impl Into<String>, layers: Vec<LayerNode>) -> Self {
        let total_params = layers.iter().filter_map(LayerNode::param_count).sum();
        Self {
            name: name.into(),
            total_params,
            trainable_params: None,
            layers,
        }
    }

    /// Find a layer anywhere in the tree (see [`find_layer`])
    pub fn find_layer(&self, id: &str) -> Option<&LayerNode> {
        find_layer(&self.layers, id)
    }

    /// Total number of layers at any depth
    pub fn layer_count(&self) -> usize {
        layer_count(&self.layers)
    }

    /// Ids of the top-level layers, in order
    pub fn top_level_ids(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.id.as_str()).collect()
    }

    /// Reject trees nested deeper than [`MAX_LAYER_DEPTH`]
    pub fn check_depth(&self) -> Result<()> {
        let depth = max_depth(&self.layers);
        if depth > MAX_LAYER_DEPTH {
            return Err(ViewerError::InvalidPayload {
                reason: format!(
                    "layer tree is nested {} levels deep (limit {})",
                    depth, MAX_LAYER_DEPTH
                ),
            });
        }
        Ok(())
    }
}

/// Decode a model structure from backend JSON
///
/// Any nesting decodes without exhausting the stack; trees deeper than
/// [`MAX_LAYER_DEPTH`] are then rejected as `InvalidPayload`.
pub fn decode_structure(json: &str) -> Result<ModelStructure> {
    let structure: ModelStructure = decode_unbounded(json)?;
    structure.check_depth()?;
    Ok(structure)
}

/// Decode any payload that embeds a layer tree, without a nesting limit
///
/// serde_json's recursion limit is lifted and `serde_stacker` grows the
/// stack on the heap as the decoder descends.
pub(crate) fn decode_unbounded<T: DeserializeOwned>(json: &str) -> Result<T> {
    let mut de = serde_json::Deserializer::from_str(json);
    de.disable_recursion_limit();
    let stacked = serde_stacker::Deserializer::new(&mut de);
    let value = T::deserialize(stacked).map_err(|e| ViewerError::InvalidPayload {
        reason: e.to_string(),
    })?;
    de.end().map_err(|e| ViewerError::InvalidPayload {
        reason: e.to_string(),
    })?;
    Ok(value)
}

/// Pre-order depth-first search for a layer by id
///
/// A node is visited before its children, so if malformed input repeats an
/// id at several depths the outermost (pre-order-first) match wins.
pub fn find_layer<'a>(layers: &'a [LayerNode], id: &str) -> Option<&'a LayerNode> {
    let mut stack: Vec<&LayerNode> = layers.iter().rev().collect();
    while let Some(node) = stack.pop() {
        if node.id == id {
            return Some(node);
        }
        stack.extend(node.children().iter().rev());
    }
    None
}

/// Pre-order listing of every layer with its nesting depth (0 = top level)
pub fn outline(layers: &[LayerNode]) -> Vec<(usize, &LayerNode)> {
    let mut out = Vec::new();
    let mut stack: Vec<(usize, &LayerNode)> = layers.iter().rev().map(|l| (0, l)).collect();
    while let Some((depth, node)) = stack.pop() {
        out.push((depth, node));
        stack.extend(node.children().iter().rev().map(|c| (depth + 1, c)));
    }
    out
}

/// Number of nesting levels (0 for an empty tree, 1 for leaves only)
pub fn max_depth(layers: &[LayerNode]) -> usize {
    let mut deepest = 0;
    let mut stack: Vec<(usize, &LayerNode)> = layers.iter().map(|l| (1, l)).collect();
    while let Some((depth, node)) = stack.pop() {
        deepest = deepest.max(depth);
        stack.extend(node.children().iter().map(|c| (depth + 1, c)));
    }
    deepest
}

/// Number of layers at any depth
pub fn layer_count(layers: &[LayerNode]) -> usize {
    let mut count = 0;
    let mut stack: Vec<&LayerNode> = layers.iter().collect();
    while let Some(node) = stack.pop() {
        count += 1;
        stack.extend(node.children());
    }
    count
}

/// Ids that occur more than once anywhere in the tree, in first-seen order
pub fn duplicate_ids(layers: &[LayerNode]) -> Vec<String> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut order = Vec::new();
    for (_, node) in outline(layers) {
        let hits = seen.entry(node.id.as_str()).or_insert(0);
        *hits += 1;
        if *hits == 2 {
            order.push(node.id.clone());
        }
    }
    order
}

// ============================================================================
// Unit Tests
// ============================================================================
