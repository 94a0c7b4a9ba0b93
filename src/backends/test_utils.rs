//! Mock segmentation backend for tests
//!
//! Predicts a hard-edged foreground square covering the middle half of the
//! model input, so tests can check where the mask lands without a model file.

use crate::{
    error::{CanvasError, Result},
    inference::InferenceBackend,
    utils::PreprocessingConfig,
};
use instant::Duration;
use ndarray::Array4;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// Mock backend with a fixed central-square prediction
#[derive(Debug, Clone)]
pub struct MockSegmentationBackend {
    initialized: bool,
    input_size: u32,
    should_fail_inference: bool,
    empty_prediction: bool,
    calls: Arc<AtomicUsize>,
}

impl MockSegmentationBackend {
    #[must_use]
    pub fn new(input_size: u32) -> Self {
        Self {
            initialized: false,
            input_size,
            should_fail_inference: false,
            empty_prediction: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Backend whose inference always fails
    #[must_use]
    pub fn new_failing_inference(input_size: u32) -> Self {
        Self {
            should_fail_inference: true,
            ..Self::new(input_size)
        }
    }

    /// Backend that predicts no foreground at all
    #[must_use]
    pub fn new_empty(input_size: u32) -> Self {
        Self {
            empty_prediction: true,
            ..Self::new(input_size)
        }
    }

    /// Shared counter of `infer` calls
    #[must_use]
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl InferenceBackend for MockSegmentationBackend {
    fn initialize(&mut self) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }
        self.initialized = true;
        Ok(Some(Duration::from_millis(1)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        if !self.initialized {
            return Err(CanvasError::inference("Mock backend not initialized"));
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail_inference {
            return Err(CanvasError::inference("Mock inference failure"));
        }

        let size = self.input_size as usize;
        if input.shape() != [1, 3, size, size] {
            return Err(CanvasError::inference(format!(
                "Mock expected (1, 3, {size}, {size}), got {:?}",
                input.shape()
            )));
        }

        let (low, high) = (size / 4, size * 3 / 4);
        let empty = self.empty_prediction;
        Ok(Array4::from_shape_fn((1, 1, size, size), |(_, _, y, x)| {
            let inside = (low..high).contains(&x) && (low..high).contains(&y);
            if inside && !empty {
                1.0
            } else {
                0.0
            }
        }))
    }

    fn preprocessing_config(&self) -> PreprocessingConfig {
        PreprocessingConfig::imagenet(self.input_size)
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
