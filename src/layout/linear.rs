//! Linear (horizontal) layout for CNN and plain feed-forward models

use super::{chain_connections, CameraPose, LayoutBranch, LayoutResult, Vec3};
use crate::model::LayerNode;
use std::collections::BTreeMap;

/// X of the first layer; the space to its left holds the input-image panel
pub(super) const START_X: f32 = 3.0;

/// Horizontal distance between layer centres
pub(super) const SPACING: f32 = 2.5;

/// Edges start and end this far from a layer centre along x
const EDGE_INSET: f32 = 0.7;

pub(super) const INPUT_PANEL: Vec3 = [-2.0, 0.0, 0.0];

const CAMERA_HEIGHT: f32 = 3.0;
const MIN_CAMERA_DISTANCE: f32 = 30.0;
const CAMERA_DISTANCE_PER_LAYER: f32 = 3.0;

pub(super) fn layout(layers: &[LayerNode]) -> LayoutResult {
    let positions: BTreeMap<String, Vec3> = layers
        .iter()
        .enumerate()
        .map(|(i, layer)| (layer.id.clone(), [x_at(i), 0.0, 0.0]))
        .collect();

    let connections = chain_connections(layers, &positions, |prev, curr| {
        ([prev[0] + EDGE_INSET, 0.0, 0.0], [curr[0] - EDGE_INSET, 0.0, 0.0])
    });

    LayoutResult {
        branch: LayoutBranch::Linear,
        positions,
        sizes: BTreeMap::new(),
        connections,
        groups: Vec::new(),
        camera: frame(layers.len()),
        input_panel: INPUT_PANEL,
        first_layer_x: START_X,
    }
}

fn x_at(index: usize) -> f32 {
    START_X + index as f32 * SPACING
}

/// Centre the camera on the chain and back off with its length
fn frame(count: usize) -> CameraPose {
    let span = x_at(count.saturating_sub(1));
    let centre = span / 2.0;
    let distance = (count as f32 * CAMERA_DISTANCE_PER_LAYER).max(MIN_CAMERA_DISTANCE);
    CameraPose {
        position: [centre, CAMERA_HEIGHT, distance],
        target: [centre, 0.0, 0.0],
    }
}
