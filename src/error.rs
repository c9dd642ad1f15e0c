use thiserror::Error;

/// Failures surfaced by a single annotation request.
#[derive(Error, Debug)]
pub enum AnnotateError {
    /// The input image or its data URI could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Text metrics were unavailable, so labels cannot be laid out.
    #[error("measurement error: {0}")]
    Measurement(String),

    /// A record could not be written to the store.
    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AnnotateError>;
