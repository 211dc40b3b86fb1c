//! Error types for the neon-eraser crate.

use std::path::PathBuf;

/// Errors that can occur while ingesting an image or requesting an edit.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The selected file could not be read into memory.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// Path of the file that failed to load.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The file is not an image type the edit service accepts.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// Transport or service-side fault, including a missing credential.
    #[error("edit request failed: {0}")]
    RequestFailed(String),

    /// The service answered but returned no image (it may have declined the edit).
    #[error("No image data returned from the model. It might have refused the request.")]
    NoImageReturned,

    /// An encoded payload was not a valid base64 data URI.
    #[error("invalid image payload: {0}")]
    InvalidPayload(String),

    /// An I/O error occurred while writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error occurred while decoding image data.
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::RequestFailed(err.to_string())
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let read = Error::Read {
            path: PathBuf::from("/tmp/missing.png"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        let msg = read.to_string();
        assert!(msg.contains("missing.png"));
        assert!(msg.contains("gone"));

        let unsupported = Error::UnsupportedFormat("tiff".to_string());
        assert!(unsupported.to_string().contains("tiff"));

        let failed = Error::RequestFailed("HTTP 403".to_string());
        assert!(failed.to_string().contains("HTTP 403"));
    }

    #[test]
    fn no_image_message_mentions_refusal() {
        let msg = Error::NoImageReturned.to_string();
        assert!(msg.contains("refused the request"));
    }
}
