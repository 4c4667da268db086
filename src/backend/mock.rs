//! In-memory model backend
//!
//! Serves the two built-in demo models with deterministic synthetic traces.
//! Used by `--mock`, by the test suite, and anywhere a live backend is not
//! needed. Uploads are accepted for existing `.pt`/`.pth` files and get a
//! small generated structure.

use super::ModelBackend;
use crate::error::{Result, ViewerError};
use crate::model::{
    outline, ActivationStats, ComputationStep, Heatmap, InferenceResult, LayerNode, LayerParams,
    ModelInfo, ModelList, ModelStructure, UploadRequest, UploadResponse,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// Opaque stand-in for the rendered input image
const INPUT_IMAGE: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

/// Heatmap edge length for convolution steps
const HEATMAP_SIZE: usize = 4;

struct Entry {
    info: ModelInfo,
    structure: ModelStructure,
    input_shape: Vec<usize>,
}

/// Backend serving fixtures from memory
pub struct MockBackend {
    models: RwLock<Vec<Entry>>,
    offline: AtomicBool,
}

impl MockBackend {
    /// Backend with the built-in `tiny_resnet` and `mini_transformer`
    pub fn new() -> Self {
        let models = vec![
            Entry {
                info: ModelInfo::new("tiny_resnet", "Tiny ResNet", "CNN"),
                structure: tiny_resnet(),
                input_shape: vec![1, 3, 32, 32],
            },
            Entry {
                info: ModelInfo::new("mini_transformer", "Mini Transformer", "Transformer"),
                structure: mini_transformer(),
                input_shape: vec![1, 16],
            },
        ];
        Self {
            models: RwLock::new(models),
            offline: AtomicBool::new(false),
        }
    }

    /// Backend with no models at all
    pub fn empty() -> Self {
        Self {
            models: RwLock::new(Vec::new()),
            offline: AtomicBool::new(false),
        }
    }

    /// Register an extra model under `id`
    pub async fn insert(&self, id: &str, kind: &str, structure: ModelStructure) {
        let mut models = self.models.write().await;
        models.retain(|e| e.info.id != id);
        models.push(Entry {
            info: ModelInfo::new(id, &structure.name, kind),
            structure,
            input_shape: vec![1],
        });
    }

    /// Simulate an unreachable backend
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ViewerError::BackendConnection {
                message: "mock backend is offline".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn list_models(&self) -> Result<ModelList> {
        self.check_online()?;
        let models = self.models.read().await;
        Ok(ModelList {
            models: models.iter().map(|e| e.info.clone()).collect(),
        })
    }

    async fn load_model(&self, model: &str) -> Result<ModelStructure> {
        self.check_online()?;
        let models = self.models.read().await;
        models
            .iter()
            .find(|e| e.info.id == model)
            .map(|e| e.structure.clone())
            .ok_or_else(|| ViewerError::ModelNotFound {
                model: model.to_string(),
            })
    }

    async fn run_inference(&self, model: &str) -> Result<InferenceResult> {
        self.check_online()?;
        let models = self.models.read().await;
        let entry = models
            .iter()
            .find(|e| e.info.id == model)
            .ok_or_else(|| ViewerError::ModelNotFound {
                model: model.to_string(),
            })?;
        Ok(synthesize_trace(entry))
    }

    async fn upload_model(&self, request: &UploadRequest) -> Result<UploadResponse> {
        self.check_online()?;
        request.validate()?;
        tokio::fs::metadata(&request.file).await?;

        let model_id = format!("custom_{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);
        let structure = if request.model_type.eq_ignore_ascii_case("transformer") {
            ModelStructure::new(request.name.clone(), uploaded_transformer())
        } else {
            ModelStructure::new(request.name.clone(), uploaded_cnn(request.input_channels))
        };

        let mut info = ModelInfo::new(&model_id, &request.name, &request.model_type.to_uppercase());
        info.custom = true;
        self.models.write().await.push(Entry {
            info,
            structure: structure.clone(),
            input_shape: vec![
                1,
                request.input_channels as usize,
                request.input_height as usize,
                request.input_width as usize,
            ],
        });
        tracing::info!(id = %model_id, "Mock upload registered");

        Ok(UploadResponse {
            success: true,
            model_id,
            name: request.name.clone(),
            structure,
        })
    }

    async fn delete_model(&self, model_id: &str) -> Result<()> {
        self.check_online()?;
        let mut models = self.models.write().await;
        let index = models
            .iter()
            .position(|e| e.info.id == model_id)
            .ok_or_else(|| ViewerError::ModelNotFound {
                model: model_id.to_string(),
            })?;
        if !models[index].info.custom {
            return Err(ViewerError::BackendStatus {
                status: 400,
                body: "Cannot delete built-in models".to_string(),
            });
        }
        models.remove(index);
        Ok(())
    }
}

// ============================================================================
// Trace synthesis
// ============================================================================

/// Deterministic trace: one step per leaf layer in pre-order
fn synthesize_trace(entry: &Entry) -> InferenceResult {
    let leaves = outline(&entry.structure.layers)
        .into_iter()
        .map(|(_, layer)| layer)
        .filter(|layer| layer.children().is_empty());

    let mut input_shape = entry.input_shape.clone();
    let mut steps = Vec::new();
    for (i, layer) in leaves.enumerate() {
        let output_shape = layer
            .output_shape
            .clone()
            .unwrap_or_else(|| input_shape.clone());

        let phase = (i + 1) as f64;
        let mean = (phase * 0.7).sin() * 0.6;
        let std = 0.4 + (phase * 0.3).cos().abs() * 0.5;
        let mut step = ComputationStep::new(i, layer.id.clone(), layer.name.clone())
            .with_operation(layer.kind.clone())
            .with_stats(ActivationStats {
                mean,
                std,
                min: mean - 2.0 * std,
                max: mean + 2.0 * std,
            });
        step.input_shape = input_shape.clone();
        step.output_shape = output_shape.clone();
        if layer.kind.contains("Conv") {
            step.heatmap = Some(heatmap(phase));
        }

        input_shape = output_shape;
        steps.push(step);
    }

    InferenceResult {
        model_name: entry.structure.name.clone(),
        input_shape: entry.input_shape.clone(),
        output_shape: input_shape,
        input_image: Some(INPUT_IMAGE.to_string()),
        steps,
    }
}

fn heatmap(phase: f64) -> Heatmap {
    let grid = (0..HEATMAP_SIZE)
        .map(|r| {
            (0..HEATMAP_SIZE)
                .map(|c| ((r * HEATMAP_SIZE + c) as f64 * 0.37 + phase).sin().abs())
                .collect()
        })
        .collect();
    Heatmap::Grid(grid)
}

// ============================================================================
// Fixtures
// ============================================================================

fn layer(index: usize, name: &str, kind: &str, params: i64, output: &[usize]) -> LayerNode {
    let mut node = LayerNode::new(format!("layer_{}", index), name, kind);
    node.params = Some(LayerParams::Count(params));
    node.output_shape = Some(output.to_vec());
    node
}

fn tiny_resnet() -> ModelStructure {
    let layers = vec![
        layer(1, "conv1", "Conv2d", 448, &[1, 16, 32, 32]),
        layer(2, "bn1", "BatchNorm2d", 32, &[1, 16, 32, 32]),
        layer(3, "relu", "ReLU", 0, &[1, 16, 32, 32]),
        layer(4, "pool1", "MaxPool2d", 0, &[1, 16, 16, 16]),
        layer(5, "conv2", "Conv2d", 4_640, &[1, 32, 16, 16]),
        layer(6, "bn2", "BatchNorm2d", 64, &[1, 32, 16, 16]),
        layer(7, "conv3", "Conv2d", 9_248, &[1, 32, 16, 16]),
        layer(8, "bn3", "BatchNorm2d", 64, &[1, 32, 16, 16]),
        layer(9, "downsample1", "Conv2d", 544, &[1, 32, 16, 16]),
        layer(10, "pool2", "MaxPool2d", 0, &[1, 32, 8, 8]),
        layer(11, "conv4", "Conv2d", 18_496, &[1, 64, 8, 8]),
        layer(12, "bn4", "BatchNorm2d", 128, &[1, 64, 8, 8]),
        layer(13, "conv5", "Conv2d", 36_928, &[1, 64, 8, 8]),
        layer(14, "bn5", "BatchNorm2d", 128, &[1, 64, 8, 8]),
        layer(15, "downsample2", "Conv2d", 2_112, &[1, 64, 8, 8]),
        layer(16, "avgpool", "AdaptiveAvgPool2d", 0, &[1, 64, 1, 1]),
        layer(17, "fc", "Linear", 650, &[1, 10]),
    ];
    ModelStructure::new("tiny_resnet", layers)
}

fn mini_transformer() -> ModelStructure {
    let encoder = layer(3, "transformer", "TransformerEncoder", 0, &[1, 16, 64])
        .with_total_params(66_944)
        .with_children(vec![
            layer(4, "transformer.layers.0", "TransformerEncoderLayer", 33_472, &[1, 16, 64]),
            layer(5, "transformer.layers.1", "TransformerEncoderLayer", 33_472, &[1, 16, 64]),
        ]);
    let layers = vec![
        layer(1, "embedding", "Embedding", 64_000, &[1, 16, 64]),
        layer(2, "pos_embedding", "Embedding", 6_400, &[1, 16, 64]),
        encoder,
        layer(6, "layer_norm", "LayerNorm", 128, &[1, 16, 64]),
        layer(7, "fc", "Linear", 650, &[1, 10]),
    ];
    ModelStructure::new("mini_transformer", layers)
}

fn uploaded_cnn(channels: u32) -> Vec<LayerNode> {
    let c = i64::from(channels);
    vec![
        layer(1, "features.0", "Conv2d", c * 16 * 9 + 16, &[1, 16, 32, 32]),
        layer(2, "features.1", "ReLU", 0, &[1, 16, 32, 32]),
        layer(3, "pool", "AdaptiveAvgPool2d", 0, &[1, 16, 1, 1]),
        layer(4, "classifier", "Linear", 170, &[1, 10]),
    ]
}

fn uploaded_transformer() -> Vec<LayerNode> {
    vec![
        layer(1, "embed", "Embedding", 32_000, &[1, 16, 32]),
        layer(2, "encoder", "TransformerEncoderLayer", 8_544, &[1, 16, 32]),
        layer(3, "head", "Linear", 330, &[1, 10]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::find_layer;

    #[tokio::test]
    async fn test_builtin_models_listed() {
        let backend = MockBackend::new();
        let list = backend.list_models().await.unwrap();
        let ids: Vec<_> = list.models.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["tiny_resnet", "mini_transformer"]);
        assert!(list.models.iter().all(|m| !m.custom));
    }

    #[tokio::test]
    async fn test_tiny_resnet_structure() {
        let backend = MockBackend::new();
        let structure = backend.load_model("tiny_resnet").await.unwrap();
        assert_eq!(structure.layers.len(), 17);
        assert_eq!(structure.layers[0].name, "conv1");
        assert_eq!(structure.layers[16].kind, "Linear");
        assert_eq!(structure.total_params, 73_482);
    }

    #[tokio::test]
    async fn test_trace_covers_leaves_in_order() {
        let backend = MockBackend::new();
        let structure = backend.load_model("mini_transformer").await.unwrap();
        let result = backend.run_inference("mini_transformer").await.unwrap();

        let ids: Vec<_> = result.steps.iter().map(|s| s.layer_id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["layer_1", "layer_2", "layer_4", "layer_5", "layer_6", "layer_7"]
        );
        for (i, step) in result.steps.iter().enumerate() {
            assert_eq!(step.step_index, i);
            assert!(find_layer(&structure.layers, &step.layer_id).is_some());
        }
        assert_eq!(result.output_shape, vec![1, 10]);
        assert!(result.input_image.is_some());
    }

    #[tokio::test]
    async fn test_trace_is_deterministic() {
        let backend = MockBackend::new();
        let a = backend.run_inference("tiny_resnet").await.unwrap();
        let b = backend.run_inference("tiny_resnet").await.unwrap();
        assert_eq!(a, b);
        assert!(a.steps[0].heatmap.is_some());
        assert!(a.steps[2].heatmap.is_none());
    }

    #[tokio::test]
    async fn test_unknown_model() {
        let backend = MockBackend::new();
        let err = backend.load_model("vgg").await.unwrap_err();
        assert_eq!(err.error_code(), "MODEL_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_offline() {
        let backend = MockBackend::new();
        backend.set_offline(true);
        let err = backend.list_models().await.unwrap_err();
        assert_eq!(err.error_code(), "BACKEND_CONNECTION");
        backend.set_offline(false);
        assert!(backend.list_models().await.is_ok());
    }

    #[tokio::test]
    async fn test_upload_then_delete() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.pth");
        std::fs::write(&path, b"weights").unwrap();

        let backend = MockBackend::new();
        let mut request = UploadRequest::new(&path, "My Net");
        request.model_type = "transformer".to_string();
        let response = backend.upload_model(&request).await.unwrap();

        assert!(response.success);
        assert!(response.model_id.starts_with("custom_"));
        assert_eq!(response.model_id.len(), "custom_".len() + 8);
        assert_eq!(response.structure.layers[1].kind, "TransformerEncoderLayer");

        let list = backend.list_models().await.unwrap();
        assert!(list.models.iter().any(|m| m.id == response.model_id && m.custom));

        backend.delete_model(&response.model_id).await.unwrap();
        let err = backend.load_model(&response.model_id).await.unwrap_err();
        assert_eq!(err.error_code(), "MODEL_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_upload_missing_file() {
        let backend = MockBackend::new();
        let err = backend
            .upload_model(&UploadRequest::new("/nonexistent/net.pt", "net"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "IO_ERROR");
    }

    #[tokio::test]
    async fn test_builtin_cannot_be_deleted() {
        let backend = MockBackend::new();
        let err = backend.delete_model("tiny_resnet").await.unwrap_err();
        assert!(matches!(err, ViewerError::BackendStatus { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_insert_custom_structure() {
        let backend = MockBackend::empty();
        assert!(backend.list_models().await.unwrap().models.is_empty());

        let structure = ModelStructure::new("tiny_mlp", vec![LayerNode::new("a", "a", "Linear")]);
        backend.insert("tiny_mlp", "MLP", structure).await;
        let result = backend.run_inference("tiny_mlp").await.unwrap();
        assert_eq!(result.steps.len(), 1);
        assert_eq!(result.steps[0].input_shape, vec![1]);
    }
}
