//! Error types for listing image processing

use thiserror::Error;

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, CanvasError>;

/// Errors produced while decoding, cutting out, composing or encoding product images
#[derive(Error, Debug)]
pub enum CanvasError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Malformed request input (bad form field, unknown preset, empty upload)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Upload is not an image format we can decode
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Upload exceeds the configured size limit
    #[error("Upload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    /// Background remover failed (remote API, network, model)
    #[error("Background removal failed: {0}")]
    Removal(String),

    /// Model loading errors
    #[error("Model error: {0}")]
    Model(String),

    /// Model inference errors
    #[error("Inference error: {0}")]
    Inference(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// ZIP archive assembly errors
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Pipeline invariant violations
    #[error("Processing error: {0}")]
    Processing(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CanvasError {
    /// Create a new invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new unsupported format error
    pub fn unsupported_format<S: Into<String>>(format: S) -> Self {
        Self::UnsupportedFormat(format.into())
    }

    /// Create a new background removal error
    pub fn removal<S: Into<String>>(msg: S) -> Self {
        Self::Removal(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {rec}"),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {parameter}: {value} (valid range: {valid_range}).{recommendation}"
        ))
    }

    /// Create a request field error with the accepted range
    pub fn field_value_error<T: std::fmt::Display>(field: &str, value: T, valid: &str) -> Self {
        Self::InvalidInput(format!("Invalid '{field}': {value} (expected {valid})"))
    }

    /// Create removal error with backend context
    pub fn removal_error_with_backend(backend: &str, status: Option<u16>, detail: &str) -> Self {
        let status_text = match status {
            Some(code) => format!(" (HTTP {code})"),
            None => String::new(),
        };

        Self::Removal(format!("{backend} backend failed{status_text}: {detail}"))
    }

    /// Whether the error was caused by the caller rather than the service
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_) | Self::UnsupportedFormat(_) | Self::PayloadTooLarge { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CanvasError::invalid_input("bad color");
        assert!(matches!(err, CanvasError::InvalidInput(_)));

        let err = CanvasError::unsupported_format("text/plain");
        assert!(matches!(err, CanvasError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_error_display() {
        let err = CanvasError::invalid_config("port must be non-zero");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: port must be non-zero"
        );

        let err = CanvasError::PayloadTooLarge {
            size: 2048,
            limit: 1024,
        };
        assert_eq!(
            err.to_string(),
            "Upload of 2048 bytes exceeds the 1024 byte limit"
        );
    }

    #[test]
    fn test_contextual_errors() {
        let err = CanvasError::config_value_error("fill ratio", 1.5, "0.1-1.0", Some(0.85));
        let error_string = err.to_string();
        assert!(error_string.contains("fill ratio"));
        assert!(error_string.contains("1.5"));
        assert!(error_string.contains("Recommended: 0.85"));

        let err = CanvasError::removal_error_with_backend("remote", Some(402), "credits exhausted");
        let error_string = err.to_string();
        assert!(error_string.contains("remote backend failed (HTTP 402)"));
        assert!(error_string.contains("credits exhausted"));

        let err = CanvasError::field_value_error("width", 0, "100-10000");
        assert!(err.to_string().contains("'width'"));
    }

    #[test]
    fn test_client_error_classification() {
        assert!(CanvasError::invalid_input("x").is_client_error());
        assert!(CanvasError::unsupported_format("x").is_client_error());
        assert!(CanvasError::PayloadTooLarge { size: 2, limit: 1 }.is_client_error());
        assert!(!CanvasError::removal("x").is_client_error());
        assert!(!CanvasError::internal("x").is_client_error());
    }
}
