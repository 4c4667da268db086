//! Error handling for Layerscope
//!
//! Query operations such as tree lookup and layout never fail; they degrade
//! to empty results. Backend calls, configuration and playback controls
//! report through [`ViewerError`].

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Layerscope operations
pub type Result<T> = std::result::Result<T, ViewerError>;

/// Main error type for Layerscope operations
#[derive(Error, Debug)]
pub enum ViewerError {
    // Backend Errors
    #[error("Backend connection failed: {message}")]
    BackendConnection { message: String },

    #[error("Backend request timed out after {timeout_ms}ms")]
    BackendTimeout { timeout_ms: u64 },

    #[error("Backend returned {status}: {body}")]
    BackendStatus { status: u16, body: String },

    #[error("Invalid response from backend: {reason}")]
    InvalidPayload { reason: String },

    #[error("Backend support not available: {reason}")]
    BackendUnavailable { reason: String },

    #[error("Model not found: {model}")]
    ModelNotFound { model: String },

    // Upload Errors
    #[error("Upload rejected: {reason}")]
    UploadRejected { reason: String },

    // Session Errors
    #[error("No model loaded")]
    NoModelLoaded,

    // Playback Errors
    #[error("Step {index} is outside the trace (length {len})")]
    StepOutOfRange { index: usize, len: usize },

    #[error("No trace loaded")]
    NoTraceLoaded,

    #[error("Invalid playback speed: {speed}")]
    InvalidSpeed { speed: f64 },

    #[error("Playback timer has shut down")]
    PlaybackClosed,

    // Configuration Errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Config file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ViewerError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            ViewerError::BackendConnection { .. } => "BACKEND_CONNECTION",
            ViewerError::BackendTimeout { .. } => "BACKEND_TIMEOUT",
            ViewerError::BackendStatus { .. } => "BACKEND_STATUS",
            ViewerError::InvalidPayload { .. } => "INVALID_PAYLOAD",
            ViewerError::BackendUnavailable { .. } => "BACKEND_UNAVAILABLE",
            ViewerError::ModelNotFound { .. } => "MODEL_NOT_FOUND",
            ViewerError::UploadRejected { .. } => "UPLOAD_REJECTED",
            ViewerError::NoModelLoaded => "NO_MODEL_LOADED",
            ViewerError::StepOutOfRange { .. } => "STEP_OUT_OF_RANGE",
            ViewerError::NoTraceLoaded => "NO_TRACE_LOADED",
            ViewerError::InvalidSpeed { .. } => "INVALID_SPEED",
            ViewerError::PlaybackClosed => "PLAYBACK_CLOSED",
            ViewerError::InvalidConfig { .. } => "INVALID_CONFIG",
            ViewerError::ConfigNotFound { .. } => "CONFIG_NOT_FOUND",
            ViewerError::Io(_) => "IO_ERROR",
            ViewerError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if repeating the triggering action could succeed
    ///
    /// Nothing is retried automatically; this only drives what the user is told.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ViewerError::BackendConnection { .. }
                | ViewerError::BackendTimeout { .. }
                | ViewerError::BackendStatus { .. }
                | ViewerError::NoModelLoaded
                | ViewerError::NoTraceLoaded
                | ViewerError::StepOutOfRange { .. }
                | ViewerError::InvalidSpeed { .. }
                | ViewerError::UploadRejected { .. }
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            ViewerError::BackendConnection { .. } => vec![
                "Check that the model backend is running",
                "Verify the backend URL (--backend-url or LAYERSCOPE_BACKEND_URL)",
            ],
            ViewerError::BackendTimeout { .. } => vec![
                "The backend may still be loading the model - try again",
                "Increase the timeout with LAYERSCOPE_TIMEOUT_MS",
            ],
            ViewerError::BackendStatus { .. } => vec![
                "Check the backend logs for details",
                "Reload the model list - the model may have been removed",
            ],
            ViewerError::ModelNotFound { .. } => vec![
                "Run 'layerscope models' to see available models",
                "Upload the model first with 'layerscope upload'",
            ],
            ViewerError::UploadRejected { .. } => vec![
                "Only .pt and .pth files are supported",
                "Save the full model with torch.save(model, path), not a state_dict",
            ],
            ViewerError::NoModelLoaded => vec!["Load a model before running inference"],
            ViewerError::NoTraceLoaded => vec!["Run inference to capture a trace first"],
            ViewerError::InvalidSpeed { .. } => vec![
                "Use a speed between 0.001 and 1000 steps per second",
                "Presets are 0.5, 1 and 2",
            ],
            ViewerError::InvalidConfig { .. } | ViewerError::ConfigNotFound { .. } => vec![
                "Check the config file path and contents",
                "Remove the --config flag to use defaults",
            ],
            _ => vec![],
        }
    }

    /// Get a user-friendly message for this error
    ///
    /// This is the single line shown in the session's error slot.
    pub fn friendly_message(&self) -> String {
        match self {
            ViewerError::BackendConnection { .. } => {
                "Couldn't reach the model backend. Is it running?".to_string()
            }
            ViewerError::BackendTimeout { timeout_ms } => {
                format!("The backend didn't answer within {:.1}s.", *timeout_ms as f64 / 1000.0)
            }
            ViewerError::BackendStatus { status, .. } => {
                format!("The backend rejected the request (HTTP {}).", status)
            }
            ViewerError::ModelNotFound { model } => {
                format!("The backend doesn't know a model called '{}'.", model)
            }
            ViewerError::NoModelLoaded => "Load a model first.".to_string(),
            _ => self.to_string(),
        }
    }
}
