//! Model backend collaborator
//!
//! The viewer never inspects models itself. A backend serves layer trees
//! and runs inference, returning the computation trace.
//!
//! Two implementations:
//! - [`HttpBackend`] talks to the Python backend over HTTP
//! - [`MockBackend`] serves built-in fixtures from memory

mod http;
mod mock;

pub use http::HttpBackend;
pub use mock::MockBackend;

use crate::config::ViewerConfig;
use crate::error::Result;
use crate::model::{InferenceResult, ModelList, ModelStructure, UploadRequest, UploadResponse};
use async_trait::async_trait;

/// Interface every model backend implements
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Short name for logs ("http", "mock")
    fn name(&self) -> &str;

    async fn list_models(&self) -> Result<ModelList>;

    /// Fetch the layer tree of a model
    async fn load_model(&self, model: &str) -> Result<ModelStructure>;

    /// Run one forward pass and return the captured trace
    async fn run_inference(&self, model: &str) -> Result<InferenceResult>;

    /// Register a saved model file
    async fn upload_model(&self, request: &UploadRequest) -> Result<UploadResponse>;

    /// Remove an uploaded model
    async fn delete_model(&self, model_id: &str) -> Result<()>;
}

/// Pick a backend for the given configuration
pub fn connect(config: &ViewerConfig, mock: bool) -> Result<Box<dyn ModelBackend>> {
    if mock {
        tracing::info!("Using in-memory mock backend");
        return Ok(Box::new(MockBackend::new()));
    }
    tracing::info!(url = %config.backend_url, "Using HTTP backend");
    Ok(Box::new(HttpBackend::from_config(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::decode_unbounded;

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_unbounded::<ModelList>("{\"models\": [").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PAYLOAD");

        let err = decode_unbounded::<ModelList>("{\"models\": []} trailing").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PAYLOAD");
    }

    #[test]
    fn test_connect_mock() {
        let backend = connect(&ViewerConfig::default(), true).unwrap();
        assert_eq!(backend.name(), "mock");
    }
}
