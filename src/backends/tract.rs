//! Tract backend for segmentation models
//!
//! Runs an ONNX salient-object or background-matting model (`ISNet`, `U2Net`
//! and similar) with Tract, a pure Rust inference library. The model is
//! loaded from a local path and optimized for a fixed square input size.

use crate::error::{CanvasError, Result};
use crate::inference::InferenceBackend;
use crate::utils::PreprocessingConfig;
use ndarray::Array4;
use std::path::PathBuf;
use tracing::{debug, info};
use tract_onnx::prelude::*;

/// Type alias for the complex Tract model type to reduce complexity warnings
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

// Use instant crate for cross-platform time compatibility
use instant::{Duration, Instant};

/// Tract backend for running segmentation models using pure Rust inference
#[derive(Debug)]
pub struct TractBackend {
    model_path: PathBuf,
    input_size: u32,
    model: Option<TractModel>,
}

impl TractBackend {
    /// Create an uninitialized backend for the model at `model_path`
    #[must_use]
    pub fn new(model_path: impl Into<PathBuf>, input_size: u32) -> Self {
        Self {
            model_path: model_path.into(),
            input_size,
            model: None,
        }
    }

    /// Load and optimize the model
    fn load_model(&self) -> Result<TractModel> {
        if !self.model_path.is_file() {
            return Err(CanvasError::model(format!(
                "Model file not found: {}",
                self.model_path.display()
            )));
        }

        let size = self.input_size as usize;
        debug!(path = %self.model_path.display(), size, "loading ONNX model");

        onnx()
            .model_for_path(&self.model_path)
            .map_err(|e| CanvasError::model(format!("Failed to load ONNX model: {e}")))?
            .with_input_fact(0, f32::fact([1, 3, size, size]).into())
            .map_err(|e| CanvasError::model(format!("Failed to set model input shape: {e}")))?
            .into_optimized()
            .map_err(|e| CanvasError::model(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| CanvasError::model(format!("Failed to create runnable model: {e}")))
    }
}

impl InferenceBackend for TractBackend {
    fn initialize(&mut self) -> Result<Option<Duration>> {
        if self.model.is_some() {
            return Ok(None); // No model loading time for already initialized backend
        }

        let start = Instant::now();
        self.model = Some(self.load_model()?);
        let elapsed = start.elapsed();

        info!(
            path = %self.model_path.display(),
            input_size = self.input_size,
            load_ms = elapsed.as_millis() as u64,
            "Tract backend initialized"
        );
        Ok(Some(elapsed))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| CanvasError::inference("Tract model not initialized"))?;

        let inference_start = Instant::now();
        let input_tensor = Tensor::from(input.clone());

        let outputs = model
            .run(tvec![input_tensor.into()])
            .map_err(|e| CanvasError::inference(format!("Tract inference failed: {e}")))?;

        // Multi-output models put the final prediction first
        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| CanvasError::inference("No output tensor found"))?
            .into_arc_tensor();

        let view = output_tensor.to_array_view::<f32>().map_err(|e| {
            CanvasError::inference(format!("Failed to convert output tensor: {e}"))
        })?;

        let (height, width) = match view.shape() {
            [1, 1, h, w] | [1, h, w] => (*h, *w),
            other => {
                return Err(CanvasError::inference(format!(
                    "Expected (1, 1, H, W) output tensor, got {other:?}"
                )))
            },
        };

        let output = Array4::from_shape_vec((1, 1, height, width), view.iter().copied().collect())
            .map_err(|e| CanvasError::inference(format!("Failed to reshape output tensor: {e}")))?;

        debug!(
            elapsed_ms = inference_start.elapsed().as_millis() as u64,
            shape = ?output.shape(),
            "Tract inference completed"
        );
        Ok(output)
    }

    fn preprocessing_config(&self) -> PreprocessingConfig {
        PreprocessingConfig::imagenet(self.input_size)
    }

    fn is_initialized(&self) -> bool {
        self.model.is_some()
    }

    fn name(&self) -> &'static str {
        "tract"
    }
}
