//! Error types for kicau

use thiserror::Error;

/// Main error type for kicau
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    BadInput(String),

    #[error("File too large: {size} bytes exceeds the limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Model not loaded")]
    ModelUnavailable,

    #[error("Audio decoding error: {0}")]
    Decode(String),

    #[error("Preprocessing error: {0}")]
    Preprocessing(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("ONNX Runtime error: {0}")]
    Onnx(String),

    #[error("Model loading error: {0}")]
    ModelLoading(String),

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },
}

/// Result type for kicau operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<symphonia::core::errors::Error> for Error {
    fn from(err: symphonia::core::errors::Error) -> Self {
        Error::Decode(err.to_string())
    }
}

impl From<ort::Error> for Error {
    fn from(err: ort::Error) -> Self {
        Error::Onnx(err.to_string())
    }
}

impl From<ndarray::ShapeError> for Error {
    fn from(err: ndarray::ShapeError) -> Self {
        Error::ShapeMismatch {
            expected: "valid shape".into(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_too_large_message() {
        let err = Error::PayloadTooLarge {
            size: 60,
            limit: 50,
        };
        assert_eq!(
            err.to_string(),
            "File too large: 60 bytes exceeds the limit of 50 bytes"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
