//! Inference backend abstraction for segmentation models

use crate::{error::Result, utils::PreprocessingConfig};
use ndarray::Array4;

// Use instant crate for cross-platform time compatibility
use instant::Duration;

/// Trait for segmentation model backends
///
/// Backends take a normalized `(1, 3, S, S)` tensor and return a
/// `(1, 1, S, S)` foreground probability map in the 0-1 range.
pub trait InferenceBackend: Send {
    /// Load the model; returns the load time on first initialization
    ///
    /// # Errors
    /// - Model file missing or unreadable
    /// - Model cannot be optimized for the configured input size
    fn initialize(&mut self) -> Result<Option<Duration>>;

    /// Run inference on the input tensor
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Model inference failures
    /// - Unexpected output tensor shape
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Input size and normalization the model expects
    fn preprocessing_config(&self) -> PreprocessingConfig;

    /// Check if backend is initialized
    fn is_initialized(&self) -> bool;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::MockSegmentationBackend;

    #[test]
    fn test_mock_backend_lifecycle() {
        let mut backend = MockSegmentationBackend::new(16);
        assert!(!backend.is_initialized());
        assert!(backend.infer(&Array4::zeros((1, 3, 16, 16))).is_err());

        assert!(backend.initialize().unwrap().is_some());
        assert!(backend.is_initialized());
        // Second initialization is a no-op
        assert!(backend.initialize().unwrap().is_none());

        let output = backend.infer(&Array4::zeros((1, 3, 16, 16))).unwrap();
        assert_eq!(output.shape(), &[1, 1, 16, 16]);
        assert_eq!(backend.preprocessing_config().target_size, 16);
    }

    #[test]
    fn test_mock_backend_rejects_wrong_input() {
        let mut backend = MockSegmentationBackend::new(16);
        backend.initialize().unwrap();
        assert!(backend.infer(&Array4::zeros((1, 3, 8, 8))).is_err());
    }

    #[test]
    fn test_backend_is_object_safe() {
        let backend: Box<dyn InferenceBackend> = Box::new(MockSegmentationBackend::new(8));
        assert_eq!(backend.name(), "mock");
    }
}
