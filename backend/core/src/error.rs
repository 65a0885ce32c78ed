use thiserror::Error;

/// Top-level error type for the trackwatch engine.
///
/// None of these are fatal to a pass; callers log them and move on.
#[derive(Debug, Error)]
pub enum TrackwatchError {
    #[error("could not resolve {what}: {message}")]
    Resolution { what: String, message: String },

    #[error("delivery to {target} failed: {message}")]
    Delivery { target: String, message: String },

    #[error("history fetch failed for {channel}: {message}")]
    History { channel: String, message: String },

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("malformed stored state: {0}")]
    MalformedState(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
