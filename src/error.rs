use std::path::PathBuf;

/// Who is at fault for a failed request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request itself was unusable; retrying it unchanged will fail again.
    Client,
    /// Something broke while serving a valid request.
    Server,
}

/// Errors produced while decoding, restoring or encoding an image.
#[derive(Debug, thiserror::Error)]
pub enum RestoreError {
    #[error("Unsupported task: {0}")]
    UnsupportedTask(String),

    #[error("Empty image payload")]
    EmptyPayload,

    #[error("Invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Uploaded file is not an image: {0}")]
    NotAnImage(String),

    #[error("No `{0}` field in multipart upload")]
    MissingFile(&'static str),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Request body too large: {0}")]
    PayloadTooLarge(String),

    #[error("Checkpoint not found: {}", .0.display())]
    CheckpointNotFound(PathBuf),

    #[error("Error loading model: {0}")]
    ModelLoad(String),

    #[error("Image of {width}x{height} has no area left after cropping to a multiple of {multiple}")]
    ImageTooSmall {
        width: usize,
        height: usize,
        multiple: usize,
    },

    #[error("Tensor conversion failed: {0}")]
    Tensor(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error("Unsupported device: {0}")]
    UnsupportedDevice(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Model lock poisoned")]
    Poisoned,

    #[error("Inference worker failed: {0}")]
    Worker(String),
}

impl RestoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RestoreError::UnsupportedTask(_)
            | RestoreError::EmptyPayload
            | RestoreError::InvalidBase64(_)
            | RestoreError::NotAnImage(_)
            | RestoreError::MissingFile(_)
            | RestoreError::Decode(_)
            | RestoreError::UnsupportedContentType(_)
            | RestoreError::MalformedRequest(_)
            | RestoreError::PayloadTooLarge(_) => ErrorKind::Client,
            RestoreError::CheckpointNotFound(_)
            | RestoreError::ModelLoad(_)
            | RestoreError::ImageTooSmall { .. }
            | RestoreError::Tensor(_)
            | RestoreError::Inference(_)
            | RestoreError::Encode(_)
            | RestoreError::UnsupportedDevice(_)
            | RestoreError::InvalidConfig(_)
            | RestoreError::Poisoned
            | RestoreError::Worker(_) => ErrorKind::Server,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.kind() == ErrorKind::Client
    }
}
