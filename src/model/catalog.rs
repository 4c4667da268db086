//! Backend catalog and upload shapes

use crate::error::{Result, ViewerError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::ModelStructure;

/// File extensions accepted for model uploads
pub const UPLOAD_EXTENSIONS: &[&str] = &["pt", "pth"];

/// One entry of the backend's model list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub custom: bool,
}

impl ModelInfo {
    pub fn new(id: &str, name: &str, kind: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind: kind.to_string(),
            custom: false,
        }
    }
}

/// Response of the model list call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelList {
    pub models: Vec<ModelInfo>,
}

/// A model file to register with the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub file: PathBuf,
    pub name: String,
    /// "cnn" or "transformer"
    pub model_type: String,
    pub input_channels: u32,
    pub input_height: u32,
    pub input_width: u32,
}

impl UploadRequest {
    pub fn new(file: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            name: name.into(),
            model_type: "cnn".to_string(),
            input_channels: 3,
            input_height: 32,
            input_width: 32,
        }
    }

    /// Reject requests the backend would refuse anyway
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ViewerError::UploadRejected {
                reason: "model name is required".to_string(),
            });
        }
        let ext = self
            .file
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext {
            Some(ext) if UPLOAD_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
            _ => Err(ViewerError::UploadRejected {
                reason: format!("{} is not a .pt or .pth file", self.file.display()),
            }),
        }
    }
}

/// Response of a successful upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub success: bool,
    pub model_id: String,
    pub name: String,
    pub structure: ModelStructure,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_list_decode() {
        let json = r#"{"models": [
            {"id": "tiny_resnet", "name": "Tiny ResNet", "type": "CNN"},
            {"id": "custom_1a2b3c4d", "name": "Mine", "type": "CNN", "custom": true}
        ]}"#;
        let list: ModelList = serde_json::from_str(json).unwrap();
        assert_eq!(list.models.len(), 2);
        assert!(!list.models[0].custom);
        assert!(list.models[1].custom);
    }

    #[test]
    fn test_upload_validation() {
        assert!(UploadRequest::new("net.pt", "net").validate().is_ok());
        assert!(UploadRequest::new("net.PTH", "net").validate().is_ok());
        assert!(UploadRequest::new("net.onnx", "net").validate().is_err());
        assert!(UploadRequest::new("net", "net").validate().is_err());
        assert!(UploadRequest::new("net.pt", "  ").validate().is_err());
    }

    #[test]
    fn test_upload_defaults() {
        let req = UploadRequest::new("net.pt", "net");
        assert_eq!(req.model_type, "cnn");
        assert_eq!(
            (req.input_channels, req.input_height, req.input_width),
            (3, 32, 32)
        );
    }
}
