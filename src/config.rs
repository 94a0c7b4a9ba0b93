//! Configuration types for the listing service and canvas composition

use crate::error::{CanvasError, Result};
use crate::utils::BackgroundColor;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default endpoint of the remove.bg compatible API
pub const DEFAULT_REMOVE_BG_URL: &str = "https://api.remove.bg/v1.0/removebg";

/// Which background remover the service uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemovalBackendKind {
    /// Remote API if a key is configured, else the local model, else color keying
    Auto,
    /// Third-party remove-background HTTP API
    Remote,
    /// Local ONNX segmentation model
    Model,
    /// Border color keying (no model, no network)
    ColorKey,
    /// No removal; the photo is placed as-is
    None,
}

impl Default for RemovalBackendKind {
    fn default() -> Self {
        Self::Auto
    }
}

impl std::fmt::Display for RemovalBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Remote => write!(f, "remote"),
            Self::Model => write!(f, "model"),
            Self::ColorKey => write!(f, "color-key"),
            Self::None => write!(f, "none"),
        }
    }
}

impl std::str::FromStr for RemovalBackendKind {
    type Err = CanvasError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "remote" | "api" | "remove-bg" | "removebg" => Ok(Self::Remote),
            "model" | "local" | "tract" => Ok(Self::Model),
            "color-key" | "colorkey" | "color_key" => Ok(Self::ColorKey),
            "none" | "off" => Ok(Self::None),
            other => Err(CanvasError::invalid_config(format!(
                "Unknown removal backend '{other}' (expected auto, remote, model, color-key, none)"
            ))),
        }
    }
}

/// Canvas composition settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasConfig {
    /// Canvas width in pixels
    pub width: u32,

    /// Canvas height in pixels
    pub height: u32,

    /// Fraction of the canvas the product's longer side may occupy (0.1-1.0)
    pub fill_ratio: f32,

    /// Canvas background color
    pub background: BackgroundColor,

    /// Draw a soft drop shadow under the product
    pub shadow: bool,

    /// Apply mild sharpening and contrast
    pub enhance: bool,

    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 2000,
            height: 2000,
            fill_ratio: 0.85,
            background: BackgroundColor::white(),
            shadow: false,
            enhance: false,
            jpeg_quality: 92,
        }
    }
}

/// Smallest canvas side accepted
pub const MIN_CANVAS_SIDE: u32 = 100;

/// Largest canvas side accepted
pub const MAX_CANVAS_SIDE: u32 = 10_000;

impl CanvasConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    /// ```rust
    /// use listing_canvas::{BackgroundColor, CanvasConfig};
    ///
    /// let config = CanvasConfig::builder()
    ///     .dimensions(1600, 1600)
    ///     .fill_ratio(0.9)
    ///     .background(BackgroundColor::light_gray())
    ///     .shadow(true)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.width, 1600);
    /// ```
    #[must_use]
    pub fn builder() -> CanvasConfigBuilder {
        CanvasConfigBuilder::default()
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Canvas side outside 100-10000
    /// - Fill ratio outside 0.1-1.0
    /// - JPEG quality of 0
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("canvas width", self.width), ("canvas height", self.height)] {
            if !(MIN_CANVAS_SIDE..=MAX_CANVAS_SIDE).contains(&value) {
                return Err(CanvasError::config_value_error(
                    name,
                    value,
                    "100-10000",
                    Some(2000),
                ));
            }
        }

        if !(0.1..=1.0).contains(&self.fill_ratio) {
            return Err(CanvasError::config_value_error(
                "fill ratio",
                self.fill_ratio,
                "0.1-1.0",
                Some(0.85),
            ));
        }

        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(CanvasError::config_value_error(
                "JPEG quality",
                self.jpeg_quality,
                "1-100",
                Some(92),
            ));
        }

        Ok(())
    }
}

/// Builder for `CanvasConfig`
#[derive(Debug, Default)]
pub struct CanvasConfigBuilder {
    config: CanvasConfig,
}

impl CanvasConfigBuilder {
    /// Set canvas dimensions
    #[must_use]
    pub fn dimensions(mut self, width: u32, height: u32) -> Self {
        self.config.width = width;
        self.config.height = height;
        self
    }

    /// Set fill ratio
    #[must_use]
    pub fn fill_ratio(mut self, ratio: f32) -> Self {
        self.config.fill_ratio = ratio;
        self
    }

    /// Set background color
    #[must_use]
    pub fn background(mut self, color: BackgroundColor) -> Self {
        self.config.background = color;
        self
    }

    /// Enable or disable the drop shadow
    #[must_use]
    pub fn shadow(mut self, shadow: bool) -> Self {
        self.config.shadow = shadow;
        self
    }

    /// Enable or disable enhancement
    #[must_use]
    pub fn enhance(mut self, enhance: bool) -> Self {
        self.config.enhance = enhance;
        self
    }

    /// Set JPEG quality (clamped to 1-100)
    #[must_use]
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// - Any value rejected by [`CanvasConfig::validate`]
    pub fn build(self) -> Result<CanvasConfig> {
        let config = self.config;
        config.validate()?;
        Ok(config)
    }
}

/// Service configuration loaded from environment variables
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Background remover selection
    pub removal_backend: RemovalBackendKind,
    /// API key for the remote remover
    pub remove_bg_api_key: Option<String>,
    /// Endpoint of the remote remover
    pub remove_bg_api_url: String,
    /// Remote request timeout in seconds
    pub remote_timeout_secs: u64,
    /// Path to the ONNX segmentation model
    pub model_path: Option<PathBuf>,
    /// Square input size the model expects
    pub model_input_size: u32,
    /// Fail requests when removal fails instead of falling back
    pub strict_removal: bool,
    /// Maximum size of a single upload in bytes
    pub max_upload_bytes: usize,
    /// Maximum number of files in one batch request
    pub max_batch_files: usize,
    /// Requests per client per UTC day (0 = unlimited)
    pub daily_request_limit: u32,
    /// Allowed CORS origins (`*` allows any)
    pub cors_origins: Vec<String>,
    /// Key rate limits on `X-Forwarded-For` (only behind a proxy that sets it)
    pub trust_forwarded_for: bool,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Default canvas settings
    pub canvas: CanvasConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            removal_backend: RemovalBackendKind::Auto,
            remove_bg_api_key: None,
            remove_bg_api_url: DEFAULT_REMOVE_BG_URL.to_string(),
            remote_timeout_secs: 60,
            model_path: None,
            model_input_size: 1024,
            strict_removal: false,
            max_upload_bytes: 15 * 1024 * 1024,
            max_batch_files: 20,
            daily_request_limit: 100,
            cors_origins: vec!["*".to_string()],
            trust_forwarded_for: false,
            request_timeout_secs: 120,
            canvas: CanvasConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables with defaults
    ///
    /// | Env Var                  | Default                                 |
    /// |--------------------------|-----------------------------------------|
    /// | `HOST`                   | `0.0.0.0`                               |
    /// | `PORT`                   | `8000`                                  |
    /// | `REMOVAL_BACKEND`        | `auto`                                  |
    /// | `REMOVE_BG_API_KEY`      | unset                                   |
    /// | `REMOVE_BG_API_URL`      | `https://api.remove.bg/v1.0/removebg`   |
    /// | `REMOVE_BG_TIMEOUT_SECS` | `60`                                    |
    /// | `MODEL_PATH`             | unset                                   |
    /// | `MODEL_INPUT_SIZE`       | `1024`                                  |
    /// | `STRICT_REMOVAL`         | `false`                                 |
    /// | `MAX_UPLOAD_BYTES`       | `15728640`                              |
    /// | `MAX_BATCH_FILES`        | `20`                                    |
    /// | `DAILY_REQUEST_LIMIT`    | `100`                                   |
    /// | `CORS_ORIGINS`           | `*`                                     |
    /// | `REQUEST_TIMEOUT_SECS`   | `120`                                   |
    ///
    /// # Errors
    /// - A variable is set but cannot be parsed
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// # Errors
    /// - A variable is set but cannot be parsed
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let removal_backend = match get("REMOVAL_BACKEND") {
            Some(value) => value.parse()?,
            None => defaults.removal_backend,
        };

        let cors_origins = get("CORS_ORIGINS").map_or(defaults.cors_origins, |value| {
            value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port: parse_var(get("PORT"), "PORT", defaults.port)?,
            removal_backend,
            remove_bg_api_key: get("REMOVE_BG_API_KEY"),
            remove_bg_api_url: get("REMOVE_BG_API_URL").unwrap_or(defaults.remove_bg_api_url),
            remote_timeout_secs: parse_var(
                get("REMOVE_BG_TIMEOUT_SECS"),
                "REMOVE_BG_TIMEOUT_SECS",
                defaults.remote_timeout_secs,
            )?,
            model_path: get("MODEL_PATH").map(PathBuf::from),
            model_input_size: parse_var(
                get("MODEL_INPUT_SIZE"),
                "MODEL_INPUT_SIZE",
                defaults.model_input_size,
            )?,
            strict_removal: match get("STRICT_REMOVAL") {
                Some(value) => parse_flag(&value).ok_or_else(|| {
                    CanvasError::invalid_config(format!("STRICT_REMOVAL must be a boolean, got '{value}'"))
                })?,
                None => defaults.strict_removal,
            },
            max_upload_bytes: parse_var(
                get("MAX_UPLOAD_BYTES"),
                "MAX_UPLOAD_BYTES",
                defaults.max_upload_bytes,
            )?,
            max_batch_files: parse_var(
                get("MAX_BATCH_FILES"),
                "MAX_BATCH_FILES",
                defaults.max_batch_files,
            )?,
            daily_request_limit: parse_var(
                get("DAILY_REQUEST_LIMIT"),
                "DAILY_REQUEST_LIMIT",
                defaults.daily_request_limit,
            )?,
            cors_origins,
            trust_forwarded_for: match get("TRUST_FORWARDED_FOR") {
                Some(value) => parse_flag(&value).ok_or_else(|| {
                    CanvasError::invalid_config(format!(
                        "TRUST_FORWARDED_FOR must be a boolean, got '{value}'"
                    ))
                })?,
                None => defaults.trust_forwarded_for,
            },
            request_timeout_secs: parse_var(
                get("REQUEST_TIMEOUT_SECS"),
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            )?,
            canvas: defaults.canvas,
        })
    }

    /// Resolve `Auto` into the concrete backend that will be used
    #[must_use]
    pub fn resolved_backend(&self) -> RemovalBackendKind {
        match self.removal_backend {
            RemovalBackendKind::Auto => {
                if self.remove_bg_api_key.is_some() {
                    RemovalBackendKind::Remote
                } else if cfg!(feature = "tract") && self.model_path.is_some() {
                    RemovalBackendKind::Model
                } else {
                    RemovalBackendKind::ColorKey
                }
            },
            other => other,
        }
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Port 0, zero upload limit or zero batch size
    /// - Remote backend without an API key, model backend without a model path
    /// - Invalid canvas settings
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(CanvasError::invalid_config("PORT must be non-zero"));
        }
        if self.max_upload_bytes == 0 {
            return Err(CanvasError::invalid_config("MAX_UPLOAD_BYTES must be non-zero"));
        }
        if self.max_batch_files == 0 {
            return Err(CanvasError::invalid_config("MAX_BATCH_FILES must be non-zero"));
        }
        if self.model_input_size < 32 {
            return Err(CanvasError::config_value_error(
                "model input size",
                self.model_input_size,
                ">= 32",
                Some(1024),
            ));
        }
        match self.resolved_backend() {
            RemovalBackendKind::Remote if self.remove_bg_api_key.is_none() => {
                return Err(CanvasError::invalid_config(
                    "Remote removal backend requires REMOVE_BG_API_KEY",
                ));
            },
            RemovalBackendKind::Model if self.model_path.is_none() => {
                return Err(CanvasError::invalid_config(
                    "Model removal backend requires MODEL_PATH",
                ));
            },
            _ => {},
        }
        self.canvas.validate()
    }

    /// Socket address string for binding
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T>(value: Option<String>, name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw.trim().parse().map_err(|e| {
            CanvasError::invalid_config(format!("{name} must be a valid number, got '{raw}': {e}"))
        }),
        None => Ok(default),
    }
}

/// Parse the usual spellings of a boolean form or env value
#[must_use]
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
