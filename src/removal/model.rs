//! Local segmentation model remover

use super::BackgroundRemover;
use crate::error::{CanvasError, Result};
use crate::inference::InferenceBackend;
use crate::utils::{ImagePreprocessor, PreprocessingConfig};
use async_trait::async_trait;
use image::{DynamicImage, RgbaImage};
use instant::Instant;
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument};

/// Runs a segmentation model and applies its prediction as alpha
///
/// Inference is CPU-bound, so it runs on the blocking pool. The backend is
/// behind a mutex because backends take `&mut self` to run.
pub struct ModelRemover {
    backend: Arc<Mutex<Box<dyn InferenceBackend>>>,
    preprocessing: PreprocessingConfig,
    backend_name: &'static str,
}

impl ModelRemover {
    /// Wrap a backend, initializing it if needed
    ///
    /// # Errors
    /// - Backend initialization failure
    pub fn new(mut backend: Box<dyn InferenceBackend>) -> Result<Self> {
        if let Some(load_time) = backend.initialize()? {
            debug!(
                backend = backend.name(),
                load_ms = load_time.as_millis() as u64,
                "segmentation model loaded"
            );
        }
        let preprocessing = backend.preprocessing_config();
        let backend_name = backend.name();
        Ok(Self {
            backend: Arc::new(Mutex::new(backend)),
            preprocessing,
            backend_name,
        })
    }

    /// Load an ONNX model from disk with the Tract backend
    ///
    /// # Errors
    /// - Model file missing or invalid
    #[cfg(feature = "tract")]
    pub fn from_model_path(path: &std::path::Path, input_size: u32) -> Result<Self> {
        Self::new(Box::new(crate::backends::TractBackend::new(path, input_size)))
    }

    fn segment(
        backend: &Mutex<Box<dyn InferenceBackend>>,
        preprocessing: &PreprocessingConfig,
        image: &DynamicImage,
    ) -> Result<RgbaImage> {
        let start = Instant::now();
        let (letterbox, tensor) = ImagePreprocessor::preprocess(image, preprocessing)?;
        let output = {
            let mut guard = backend
                .lock()
                .map_err(|_| CanvasError::internal("Model backend lock poisoned"))?;
            guard.infer(&tensor)?
        };
        let cutout = ImagePreprocessor::apply_mask(image, &output, &letterbox)?;
        debug!(elapsed_ms = start.elapsed().as_millis() as u64, "model segmentation done");
        Ok(cutout)
    }
}

#[async_trait]
impl BackgroundRemover for ModelRemover {
    fn name(&self) -> &'static str {
        "model"
    }

    #[instrument(skip_all, fields(backend = self.backend_name))]
    async fn remove(&self, image: &DynamicImage, _encoded: &[u8]) -> Result<RgbaImage> {
        let backend = Arc::clone(&self.backend);
        let preprocessing = self.preprocessing.clone();
        let image = image.clone();

        tokio::task::spawn_blocking(move || Self::segment(&backend, &preprocessing, &image))
            .await
            .map_err(|e| CanvasError::internal(format!("Model task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::MockSegmentationBackend;
    use image::{Rgb, RgbImage};
    use std::sync::atomic::Ordering;

    fn photo() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 32, Rgb([90, 120, 30])))
    }

    #[tokio::test]
    async fn test_model_mask_maps_to_original() {
        let backend = MockSegmentationBackend::new(32);
        let calls = backend.call_counter();
        let remover = ModelRemover::new(Box::new(backend)).unwrap();

        let cutout = remover.remove(&photo(), &[]).await.unwrap();

        assert_eq!(cutout.dimensions(), (64, 32));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // Mock predicts the middle half of the model input. The photo fills
        // rows 8..24 of that input, so only the middle columns survive.
        assert_eq!(cutout.get_pixel(32, 16)[3], 255);
        assert_eq!(cutout.get_pixel(2, 16)[3], 0);
        assert_eq!(cutout.get_pixel(62, 16)[3], 0);
    }

    #[tokio::test]
    async fn test_inference_error_propagates() {
        let remover =
            ModelRemover::new(Box::new(MockSegmentationBackend::new_failing_inference(16))).unwrap();
        let err = remover.remove(&photo(), &[]).await.unwrap_err();
        assert!(matches!(err, CanvasError::Inference(_)));
    }

    #[tokio::test]
    async fn test_empty_prediction_is_fully_transparent() {
        let remover = ModelRemover::new(Box::new(MockSegmentationBackend::new_empty(16))).unwrap();
        let cutout = remover.remove(&photo(), &[]).await.unwrap();
        assert!(cutout.pixels().all(|p| p[3] == 0));
    }
}
