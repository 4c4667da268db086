//! Model structure and trace data
//!
//! This module provides:
//! - `LayerNode` / `ModelStructure`, the canonical layer tree
//! - Iterative pre-order traversal (`find_layer`, `outline`)
//! - `ComputationStep` / `InferenceResult`, the captured trace
//! - Backend catalog and upload shapes

mod catalog;
mod layer;
mod step;

pub use catalog::{ModelInfo, ModelList, UploadRequest, UploadResponse, UPLOAD_EXTENSIONS};
pub use layer::{
    decode_structure, duplicate_ids, find_layer, layer_count, max_depth, outline, LayerNode,
    LayerParams, ModelStructure, MAX_LAYER_DEPTH,
};
pub(crate) use layer::decode_unbounded;
pub use step::{ActivationStats, ComputationStep, Heatmap, InferenceResult};
