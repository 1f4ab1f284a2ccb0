use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("request to segmentation service failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("segmentation service returned {status}: {error}{}", detail(.message))]
    Service {
        status: u16,
        error: String,
        message: Option<String>,
    },

    #[error("No mask found")]
    NoMask,

    #[error("invalid mask encoding: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {message}")]
    Config { message: String },
}

fn detail(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(" ({m})"))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, ClientError>;
