use thiserror::Error;

/// Top-level error type for the capforge runtime.
#[derive(Debug, Error)]
pub enum CapError {
    #[error("agent stream error: {0}")]
    Stream(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("no agent client configured: {0}")]
    NoClient(String),

    #[error("replay transcript error: {0}")]
    Replay(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
