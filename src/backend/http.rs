//! HTTP client for the Python model backend
//!
//! Endpoints:
//! - `GET    /models`              model list
//! - `GET    /models/{name}`       layer tree
//! - `POST   /inference/{name}`    forward pass + trace
//! - `POST   /models/upload`       multipart model upload
//! - `DELETE /models/{id}`         remove an uploaded model
//!
//! Without the `http-backend` feature every call fails with
//! `BackendUnavailable`.

use super::ModelBackend;
use crate::config::ViewerConfig;
use crate::error::{Result, ViewerError};
use crate::model::{
    decode_structure, decode_unbounded, InferenceResult, ModelList, ModelStructure,
    UploadRequest, UploadResponse,
};
use async_trait::async_trait;

/// Longest backend error body kept in an error message
const BODY_EXCERPT_CHARS: usize = 200;

#[cfg_attr(not(feature = "http-backend"), allow(dead_code))]
enum Call<'a> {
    Get(String),
    Post(String),
    Delete(String),
    Upload(&'a UploadRequest, Vec<u8>),
}

/// Model backend reached over HTTP
pub struct HttpBackend {
    base_url: String,
    timeout_ms: u64,
    #[cfg(feature = "http-backend")]
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, timeout_ms: u64) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        #[cfg(feature = "http-backend")]
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| ViewerError::BackendConnection {
                message: e.to_string(),
            })?;

        Ok(Self {
            base_url,
            timeout_ms,
            #[cfg(feature = "http-backend")]
            client,
        })
    }

    pub fn from_config(config: &ViewerConfig) -> Result<Self> {
        Self::new(config.backend_url.clone(), config.timeout_ms)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    #[cfg_attr(not(feature = "http-backend"), allow(dead_code))]
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Perform a request and return the body of a successful response
    #[cfg(feature = "http-backend")]
    async fn fetch(&self, call: Call<'_>) -> Result<String> {
        let request = match call {
            Call::Get(path) => self.client.get(self.url(&path)),
            Call::Post(path) => self.client.post(self.url(&path)),
            Call::Delete(path) => self.client.delete(self.url(&path)),
            Call::Upload(upload, bytes) => {
                let file_name = upload
                    .file
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("model.pt")
                    .to_string();
                let form = reqwest::multipart::Form::new()
                    .part(
                        "file",
                        reqwest::multipart::Part::bytes(bytes).file_name(file_name),
                    )
                    .text("name", upload.name.clone())
                    .text("model_type", upload.model_type.clone())
                    .text("input_channels", upload.input_channels.to_string())
                    .text("input_height", upload.input_height.to_string())
                    .text("input_width", upload.input_width.to_string());
                self.client.post(self.url("/models/upload")).multipart(form)
            }
        };

        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Backend request failed");
            return Err(ViewerError::BackendStatus {
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }
        Ok(body)
    }

    #[cfg(not(feature = "http-backend"))]
    async fn fetch(&self, _call: Call<'_>) -> Result<String> {
        Err(ViewerError::BackendUnavailable {
            reason: "HTTP backend support not compiled. Build with --features http-backend"
                .to_string(),
        })
    }

    #[cfg(feature = "http-backend")]
    fn transport_error(&self, e: reqwest::Error) -> ViewerError {
        if e.is_timeout() {
            ViewerError::BackendTimeout {
                timeout_ms: self.timeout_ms,
            }
        } else if e.is_connect() {
            ViewerError::BackendConnection {
                message: format!("Cannot connect to backend at {}: {}", self.base_url, e),
            }
        } else {
            ViewerError::BackendConnection {
                message: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl ModelBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn list_models(&self) -> Result<ModelList> {
        let body = self.fetch(Call::Get("/models".to_string())).await?;
        decode_unbounded(&body)
    }

    async fn load_model(&self, model: &str) -> Result<ModelStructure> {
        let body = self
            .fetch(Call::Get(format!("/models/{}", model)))
            .await
            .map_err(|e| not_found_as_model(e, model))?;
        decode_structure(&body)
    }

    async fn run_inference(&self, model: &str) -> Result<InferenceResult> {
        let body = self
            .fetch(Call::Post(format!("/inference/{}", model)))
            .await
            .map_err(|e| not_found_as_model(e, model))?;
        decode_unbounded(&body)
    }

    async fn upload_model(&self, request: &UploadRequest) -> Result<UploadResponse> {
        request.validate()?;
        let bytes = tokio::fs::read(&request.file).await?;
        let body = self
            .fetch(Call::Upload(request, bytes))
            .await
            .map_err(|e| match e {
                ViewerError::BackendStatus { status: 400, body } => {
                    ViewerError::UploadRejected { reason: body }
                }
                other => other,
            })?;

        let response: UploadResponse = decode_unbounded(&body)?;
        response.structure.check_depth()?;
        if !response.success {
            return Err(ViewerError::UploadRejected {
                reason: format!("backend did not accept {}", request.name),
            });
        }
        tracing::info!(id = %response.model_id, "Uploaded model");
        Ok(response)
    }

    async fn delete_model(&self, model_id: &str) -> Result<()> {
        self.fetch(Call::Delete(format!("/models/{}", model_id)))
            .await
            .map_err(|e| not_found_as_model(e, model_id))?;
        Ok(())
    }
}

fn not_found_as_model(err: ViewerError, model: &str) -> ViewerError {
    match err {
        ViewerError::BackendStatus { status: 404, .. } => ViewerError::ModelNotFound {
            model: model.to_string(),
        },
        other => other,
    }
}

/// Shorten an error body, preferring a JSON `detail` message
#[cfg_attr(not(feature = "http-backend"), allow(dead_code))]
fn excerpt(body: &str) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string));
    let text = detail.unwrap_or_else(|| body.trim().to_string());
    text.chars().take(BODY_EXCERPT_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let backend = HttpBackend::new("http://localhost:8000/", 1000).unwrap();
        assert_eq!(backend.base_url(), "http://localhost:8000");
        assert_eq!(backend.url("/models"), "http://localhost:8000/models");
    }

    #[test]
    fn test_excerpt_prefers_detail() {
        assert_eq!(excerpt(r#"{"detail": "Model not found"}"#), "Model not found");
        assert_eq!(excerpt("  Internal Server Error \n"), "Internal Server Error");
        assert_eq!(excerpt(&"x".repeat(500)).len(), BODY_EXCERPT_CHARS);
    }

    #[test]
    fn test_not_found_mapping() {
        let err = not_found_as_model(
            ViewerError::BackendStatus {
                status: 404,
                body: "gone".to_string(),
            },
            "tiny_resnet",
        );
        assert!(matches!(err, ViewerError::ModelNotFound { model } if model == "tiny_resnet"));

        let err = not_found_as_model(
            ViewerError::BackendStatus {
                status: 500,
                body: "boom".to_string(),
            },
            "tiny_resnet",
        );
        assert_eq!(err.error_code(), "BACKEND_STATUS");
    }

    #[cfg(feature = "http-backend")]
    mod wire {
        use super::*;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        /// Serve a single canned response and return the base URL
        async fn serve_once(status: &'static str, body: &'static str) -> String {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut buf).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..n]);
                }
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            });
            format!("http://{}", addr)
        }

        #[tokio::test]
        async fn test_list_models_over_http() {
            let url = serve_once(
                "200 OK",
                r#"{"models":[{"id":"tiny_resnet","name":"Tiny ResNet","type":"CNN"}]}"#,
            )
            .await;
            let backend = HttpBackend::new(url, 5_000).unwrap();
            let list = backend.list_models().await.unwrap();
            assert_eq!(list.models.len(), 1);
            assert_eq!(list.models[0].kind, "CNN");
        }

        #[tokio::test]
        async fn test_load_model_over_http() {
            let url = serve_once(
                "200 OK",
                r#"{"model_name":"tiny","total_params":650,"layers":[
                    {"id":"layer_1","name":"fc","type":"Linear","params":650}
                ]}"#,
            )
            .await;
            let backend = HttpBackend::new(url, 5_000).unwrap();
            let structure = backend.load_model("tiny").await.unwrap();
            assert_eq!(structure.name, "tiny");
            assert_eq!(structure.layers[0].param_count(), Some(650));
        }

        #[tokio::test]
        async fn test_missing_model_maps_to_not_found() {
            let url = serve_once("404 Not Found", r#"{"detail":"Model not found"}"#).await;
            let backend = HttpBackend::new(url, 5_000).unwrap();
            let err = backend.load_model("ghost").await.unwrap_err();
            assert_eq!(err.error_code(), "MODEL_NOT_FOUND");
        }

        #[tokio::test]
        async fn test_server_error_keeps_detail() {
            let url = serve_once("500 Internal Server Error", r#"{"detail":"CUDA OOM"}"#).await;
            let backend = HttpBackend::new(url, 5_000).unwrap();
            match backend.run_inference("tiny").await.unwrap_err() {
                ViewerError::BackendStatus { status, body } => {
                    assert_eq!(status, 500);
                    assert_eq!(body, "CUDA OOM");
                }
                other => panic!("unexpected error: {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_malformed_payload() {
            let url = serve_once("200 OK", r#"{"models": 7}"#).await;
            let backend = HttpBackend::new(url, 5_000).unwrap();
            let err = backend.list_models().await.unwrap_err();
            assert_eq!(err.error_code(), "INVALID_PAYLOAD");
        }

        #[tokio::test]
        async fn test_unreachable_backend() {
            // Bind then drop to get a port nothing listens on
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            drop(listener);

            let backend = HttpBackend::new(format!("http://{}", addr), 5_000).unwrap();
            let err = backend.list_models().await.unwrap_err();
            assert_eq!(err.error_code(), "BACKEND_CONNECTION");
            assert!(err.is_recoverable());
        }

        #[tokio::test]
        async fn test_slow_backend_times_out() {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                let (_socket, _) = listener.accept().await.unwrap();
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            });

            let backend = HttpBackend::new(format!("http://{}", addr), 50).unwrap();
            let err = backend.list_models().await.unwrap_err();
            assert!(matches!(err, ViewerError::BackendTimeout { timeout_ms: 50 }));
        }

        #[tokio::test]
        async fn test_upload_rejects_bad_extension_before_sending() {
            let backend = HttpBackend::new("http://127.0.0.1:9", 1_000).unwrap();
            let err = backend
                .upload_model(&UploadRequest::new("weights.onnx", "net"))
                .await
                .unwrap_err();
            assert_eq!(err.error_code(), "UPLOAD_REJECTED");
        }
    }
}
