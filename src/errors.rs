use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Missing required setting: {0}")]
    MissingSetting(&'static str),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Browser creation failed")]
    CreationFailed,

    #[error("Engine thread is no longer running")]
    EngineGone,

    #[error("Timed out after {0:?} waiting for the engine")]
    EngineTimeout(Duration),
}
