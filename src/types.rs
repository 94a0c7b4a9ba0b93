//! Core types passed between removers, the compositor and the HTTP layer

use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// How the background of a photo was handled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RemovalOutcome {
    /// The named backend produced a usable cutout
    Removed { backend: String },
    /// Removal failed or found nothing; the original photo was used as-is
    Fallback { reason: String },
}

impl RemovalOutcome {
    /// Value for the `X-Background-Removal` response header
    #[must_use]
    pub fn header_value(&self) -> String {
        match self {
            Self::Removed { backend } => format!("removed; backend={backend}"),
            Self::Fallback { .. } => "fallback".to_string(),
        }
    }

    /// Whether a remover actually cut out the product
    #[must_use]
    pub fn is_removed(&self) -> bool {
        matches!(self, Self::Removed { .. })
    }
}

/// Product cutout with alpha, plus how it was obtained
///
/// The image always has the dimensions of the decoded upload.
#[derive(Debug, Clone)]
pub struct Cutout {
    pub image: RgbaImage,
    pub outcome: RemovalOutcome,
}

/// Per-stage wall clock timings in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Upload decoding
    pub decode_ms: u64,

    /// Background removal (network or model)
    pub removal_ms: u64,

    /// Cropping, scaling, shadow and blending
    pub compose_ms: u64,

    /// JPEG encoding
    pub encode_ms: u64,

    /// Total end-to-end processing time
    pub total_ms: u64,
}

impl ProcessingTimings {
    /// Get timing summary for display
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Total: {}ms | Decode: {}ms | Removal: {}ms | Compose: {}ms | Encode: {}ms",
            self.total_ms, self.decode_ms, self.removal_ms, self.compose_ms, self.encode_ms
        )
    }
}

/// Encoded listing image ready to return to the client
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    /// JPEG bytes
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub outcome: RemovalOutcome,
    pub timings: ProcessingTimings,
}
