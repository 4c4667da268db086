//! Grouped (vertical) layout for transformer-style models

use super::{
    chain_connections, CameraPose, GroupBox, LayoutBranch, LayoutBucket, LayoutResult, Vec3,
    GROUP_COLOR,
};
use crate::model::LayerNode;
use std::collections::BTreeMap;

/// Vertical distance between layer centres
pub(super) const SPACING: f32 = 1.2;

/// Initial vertical offset per top-level layer
const OFFSET_PER_LAYER: f32 = 0.5;

/// Edges leave and enter this far below / above a layer centre
const EDGE_INSET: f32 = 0.4;

const GROUP_WIDTH: f32 = 4.0;
const GROUP_DEPTH: f32 = 0.6;
const GROUP_MARGIN: f32 = 1.0;
const GROUP_LABEL: &str = "Transformer";

const CAMERA: CameraPose = CameraPose {
    position: [0.0, 0.0, 18.0],
    target: [0.0, 0.0, 0.0],
};

const INPUT_PANEL_X: f32 = -6.0;

pub(super) fn layout(layers: &[LayerNode]) -> LayoutResult {
    let top = layers.len() as f32 * OFFSET_PER_LAYER;

    let mut embedding = Vec::new();
    let mut transformer = Vec::new();
    let mut other = Vec::new();
    for layer in layers {
        match LayoutBucket::classify(&layer.kind) {
            LayoutBucket::Embedding => embedding.push(layer),
            LayoutBucket::Transformer => transformer.push(layer),
            LayoutBucket::Other => other.push(layer),
        }
    }

    // Buckets continue one vertical descent: embedding, transformer, other.
    let mut positions: BTreeMap<String, Vec3> = BTreeMap::new();
    let buckets = [
        (LayoutBucket::Embedding, &embedding),
        (LayoutBucket::Transformer, &transformer),
        (LayoutBucket::Other, &other),
    ];
    let mut row = 0usize;
    for (bucket, members) in buckets {
        for layer in members.iter() {
            let y = top - row as f32 * SPACING;
            positions.insert(layer.id.clone(), [bucket.column_x(), y, 0.0]);
            row += 1;
        }
    }

    let mut groups = Vec::new();
    if !transformer.is_empty() {
        let count = transformer.len() as f32;
        let group_y = top - embedding.len() as f32 * SPACING - count * SPACING / 2.0;
        groups.push(GroupBox {
            position: [LayoutBucket::Transformer.column_x(), group_y, 0.0],
            extent: [GROUP_WIDTH, count * SPACING + GROUP_MARGIN, GROUP_DEPTH],
            label: GROUP_LABEL.to_string(),
            color: GROUP_COLOR,
        });
    }

    let connections = chain_connections(layers, &positions, |prev, curr| {
        (
            [prev[0], prev[1] - EDGE_INSET, prev[2]],
            [curr[0], curr[1] + EDGE_INSET, curr[2]],
        )
    });

    LayoutResult {
        branch: LayoutBranch::Grouped,
        positions,
        sizes: BTreeMap::new(),
        connections,
        groups,
        camera: CAMERA,
        input_panel: [INPUT_PANEL_X, top, 0.0],
        first_layer_x: LayoutBucket::Embedding.column_x(),
    }
}
