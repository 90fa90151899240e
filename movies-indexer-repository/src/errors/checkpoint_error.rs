use thiserror::Error;

#[derive(Debug, Error)]
/// Represents errors that can occur while persisting the watermark.
///
/// Reading never fails: unreadable state is reported as an absent watermark.
pub enum CheckpointError {
    #[error("Checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Checkpoint serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
