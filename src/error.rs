use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("unknown coordinate space `{0}` (expected auto, pixels or normalized)")]
    UnknownCoordinateSpace(String),
}

pub type Result<T> = std::result::Result<T, Error>;
