//! Layout Algorithm
//!
//! Pure projection from an ordered sequence of top-level layers to spatial
//! placement: positions, box sizes, connection edges, grouping boxes and a
//! camera pose. The result is never mutated in place; callers recompute it
//! whenever the layer tree is replaced.
//!
//! Two regimes are selected by a string heuristic on layer kinds:
//! - Grouped (vertical): any top-level kind containing "Transformer" or
//!   "Attention". Layers are split into embedding / transformer / other
//!   columns and the transformer column is wrapped in a grouping box.
//! - Linear (horizontal): everything else. Layers sit on the x axis to the
//!   right of the input-image panel.

mod grouped;
mod linear;
mod sizing;
mod style;

pub use sizing::{box_scale, layer_scale, layer_size, BASE_SIZE, MAX_SCALE, MIN_SCALE};
pub use style::{
    is_embedding_like, is_transformer_like, layer_color, LayerStyle, LayoutBucket, DEFAULT_COLOR,
    GROUP_COLOR,
};

use crate::model::LayerNode;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// A point or extent in diagram space
pub type Vec3 = [f32; 3];

/// Which layout regime produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutBranch {
    Grouped,
    Linear,
}

impl LayoutBranch {
    /// Branch for a set of top-level layers
    pub fn select(layers: &[LayerNode]) -> Self {
        if layers.iter().any(|l| is_transformer_like(&l.kind)) {
            LayoutBranch::Grouped
        } else {
            LayoutBranch::Linear
        }
    }
}

impl fmt::Display for LayoutBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutBranch::Grouped => write!(f, "Grouped"),
            LayoutBranch::Linear => write!(f, "Linear"),
        }
    }
}

/// Edge between two consecutive layers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Connection {
    pub from_id: String,
    pub to_id: String,
    pub from: Vec3,
    pub to: Vec3,
}

impl Connection {
    /// Edges leading into the active layer are highlighted
    pub fn is_active(&self, active_layer: Option<&str>) -> bool {
        active_layer == Some(self.to_id.as_str())
    }
}

/// Translucent box wrapping a run of related layers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupBox {
    pub position: Vec3,
    pub extent: Vec3,
    pub label: String,
    pub color: &'static str,
}

/// Camera placement
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CameraPose {
    pub position: Vec3,
    pub target: Vec3,
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            position: [0.0, 3.0, 30.0],
            target: [0.0, 0.0, 0.0],
        }
    }
}

/// Complete spatial placement for a layer tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutResult {
    pub branch: LayoutBranch,
    /// Centre of each laid-out layer, keyed by id
    pub positions: BTreeMap<String, Vec3>,
    /// Box extent of each laid-out layer, keyed by id
    pub sizes: BTreeMap<String, Vec3>,
    pub connections: Vec<Connection>,
    pub groups: Vec<GroupBox>,
    pub camera: CameraPose,
    /// Where the renderer anchors the input-image panel
    pub input_panel: Vec3,
    /// X coordinate the input-image arrow points at
    pub first_layer_x: f32,
}

impl LayoutResult {
    /// Layout of a model with no layers
    pub fn empty() -> Self {
        Self {
            branch: LayoutBranch::Linear,
            positions: BTreeMap::new(),
            sizes: BTreeMap::new(),
            connections: Vec::new(),
            groups: Vec::new(),
            camera: CameraPose::default(),
            input_panel: linear::INPUT_PANEL,
            first_layer_x: linear::START_X,
        }
    }

    pub fn position(&self, id: &str) -> Option<Vec3> {
        self.positions.get(id).copied()
    }

    pub fn size(&self, id: &str) -> Option<Vec3> {
        self.sizes.get(id).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Compute the layout for an ordered sequence of top-level layers
pub fn compute_layout(layers: &[LayerNode]) -> LayoutResult {
    if layers.is_empty() {
        return LayoutResult::empty();
    }

    let mut result = match LayoutBranch::select(layers) {
        LayoutBranch::Grouped => grouped::layout(layers),
        LayoutBranch::Linear => linear::layout(layers),
    };
    result.sizes = layers
        .iter()
        .map(|l| (l.id.clone(), layer_size(l)))
        .collect();

    tracing::debug!(
        branch = %result.branch,
        layers = layers.len(),
        connections = result.connections.len(),
        "computed layout"
    );
    result
}

/// Connect consecutive layers in input order
///
/// `endpoints` maps the previous and current centre to the edge's start and
/// end points.
fn chain_connections(
    layers: &[LayerNode],
    positions: &BTreeMap<String, Vec3>,
    endpoints: impl Fn(Vec3, Vec3) -> (Vec3, Vec3),
) -> Vec<Connection> {
    layers
        .windows(2)
        .filter_map(|pair| {
            let prev = positions.get(&pair[0].id)?;
            let curr = positions.get(&pair[1].id)?;
            let (from, to) = endpoints(*prev, *curr);
            Some(Connection {
                from_id: pair[0].id.clone(),
                to_id: pair[1].id.clone(),
                from,
                to,
            })
        })
        .collect()
}

// ============================================================================
// Unit Tests
// ============================================================================
