//! Layerscope - Neural Network Layout and Playback Engine
//!
//! Layerscope turns a model's layer tree into a spatial diagram and replays
//! a captured forward pass over it, one layer at a time.
//!
//! # Architecture
//!
//! - `model`: layer tree, trace and backend wire types
//! - `layout`: pure projection from top-level layers to positions, sizes,
//!   edges, grouping boxes and a camera pose
//! - `activation`: layer id -> trace step lookup for highlighting
//! - `playback`: step clock (state machine + tokio timer actor)
//! - `selection`: the single active layer, shared by pointer and playback
//! - `backend`: the external model service (HTTP or in-memory)
//! - `session`: one viewer's state, with error surfacing

pub mod activation;
pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod layout;
pub mod model;
pub mod playback;
pub mod selection;
pub mod session;

pub use error::{Result, ViewerError};
pub use layout::{compute_layout, LayoutResult};
pub use model::{ComputationStep, LayerNode, ModelStructure};
pub use session::ViewerSession;
