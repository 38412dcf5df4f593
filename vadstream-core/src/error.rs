use thiserror::Error;

/// All errors produced by vadstream-core.
#[derive(Debug, Error)]
pub enum VadError {
    #[error("invalid frame size: {len} samples (expected 512, 1024 or 1536)")]
    InvalidFrameSize { len: usize },

    #[error("classifier is not initialised")]
    ClassifierUnavailable,

    #[error("inference error: {0}")]
    Inference(String),

    #[error("ONNX session error: {0}")]
    OnnxSession(String),

    #[error("model file not found: {path}")]
    ModelNotFound { path: std::path::PathBuf },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("a speech event callback is already registered")]
    CallbackAlreadySet,

    #[error("speech event callback panicked: {0}")]
    CallbackPanicked(String),

    #[error("session worker has shut down")]
    SessionClosed,

    #[error("audio decode error: {0}")]
    AudioDecode(String),

    #[error("resampler error: {0}")]
    Resample(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, VadError>;
