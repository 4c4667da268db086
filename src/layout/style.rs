//! Type-keyed layer styling and layout buckets
//!
//! Layer kinds are an open vocabulary. Every lookup here has a fallback so
//! unknown kinds render with the default style in the "other" bucket.

use serde::{Deserialize, Serialize};

/// Colour used for layer kinds without an entry
pub const DEFAULT_COLOR: &str = "#6b7280";

/// Colour of the transformer grouping box
pub const GROUP_COLOR: &str = "#ec4899";

/// Does this kind select the grouped layout?
///
/// Case-sensitive substring heuristic, not a typed classification.
pub fn is_transformer_like(kind: &str) -> bool {
    kind.contains("Transformer") || kind.contains("Attention")
}

/// Kinds stacked in the left-hand column of the grouped layout
pub fn is_embedding_like(kind: &str) -> bool {
    kind == "Embedding" || kind == "LayerNorm"
}

/// Column a top-level layer lands in under the grouped layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutBucket {
    Embedding,
    Transformer,
    Other,
}

impl LayoutBucket {
    pub fn classify(kind: &str) -> Self {
        if is_embedding_like(kind) {
            LayoutBucket::Embedding
        } else if is_transformer_like(kind) {
            LayoutBucket::Transformer
        } else {
            LayoutBucket::Other
        }
    }

    /// Horizontal offset of the bucket's column
    pub fn column_x(&self) -> f32 {
        match self {
            LayoutBucket::Embedding => -3.0,
            LayoutBucket::Transformer => 0.0,
            LayoutBucket::Other => 3.0,
        }
    }
}

/// Display colour for a layer kind
pub fn layer_color(kind: &str) -> &'static str {
    match kind {
        "Conv2d" => "#3b82f6",
        "Linear" => "#22c55e",
        "BatchNorm2d" => "#eab308",
        "ReLU" => "#f97316",
        "MaxPool2d" => "#a855f7",
        "AdaptiveAvgPool2d" => "#c084fc",
        "Embedding" => "#06b6d4",
        "LayerNorm" => "#facc15",
        "TransformerEncoderLayer" => "#ec4899",
        "TransformerEncoder" => "#f43f5e",
        "MultiheadAttention" => "#e879f9",
        _ => DEFAULT_COLOR,
    }
}

/// Resolved style for one layer kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LayerStyle {
    pub color: &'static str,
    pub bucket: LayoutBucket,
}

impl LayerStyle {
    pub fn for_kind(kind: &str) -> Self {
        Self {
            color: layer_color(kind),
            bucket: LayoutBucket::classify(kind),
        }
    }
}
