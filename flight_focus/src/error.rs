// THEORY:
// A single error enum for the engine and its collaborators. Startup failures end
// only the task that hit them; transient capture and classification failures are
// retried by the caller.

use thiserror::Error;

/// Errors produced by the engine and by its collaborators.
#[derive(Debug, Error)]
pub enum FocusError {
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("media unavailable: {0}")]
    MediaUnavailable(String),

    #[error("classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    #[error("frame capture failed: {0}")]
    Capture(String),

    #[error("classification failed: {0}")]
    Classification(String),

    #[error("media source produced no frames")]
    EmptyMedia,

    #[error("unknown destination: {0}")]
    UnknownDestination(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid scenario script: {0}")]
    InvalidScript(String),

    #[error("a flight is already in progress")]
    SessionActive,

    #[error("failed to spawn {0} task: {1}")]
    Spawn(&'static str, std::io::Error),

    #[error("{0} task panicked")]
    TaskPanicked(&'static str),

    #[error("audio error: {0}")]
    Audio(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}
