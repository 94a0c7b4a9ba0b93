use crate::config::ServiceConfig;
use crate::error::Result;
use crate::processor::{ListingProcessor, ProcessorConfig};
use crate::rate_limit::DailyRateLimiter;
use crate::removal::{build_remover, BackgroundRemover};
use std::sync::Arc;

/// Shared application state available to all handlers via `State<AppState>`
///
/// Cheap to clone; everything lives behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<ListingProcessor>,
    pub limiter: Arc<DailyRateLimiter>,
    pub config: Arc<ServiceConfig>,
}

impl AppState {
    /// Build state with the remover selected by `config`
    ///
    /// # Errors
    /// - Invalid configuration
    /// - Remover initialization failure
    pub fn new(config: ServiceConfig) -> Result<Self> {
        config.validate()?;
        let remover = build_remover(&config)?;
        Self::with_remover(config, remover)
    }

    /// Build state around an existing remover
    ///
    /// # Errors
    /// - Invalid processor settings
    pub fn with_remover(config: ServiceConfig, remover: Arc<dyn BackgroundRemover>) -> Result<Self> {
        let processor_config = ProcessorConfig::builder()
            .strict_removal(config.strict_removal)
            .max_upload_bytes(config.max_upload_bytes)
            .canvas(config.canvas.clone())
            .build()?;

        Ok(Self {
            processor: Arc::new(ListingProcessor::new(remover, processor_config)),
            limiter: Arc::new(DailyRateLimiter::new(config.daily_request_limit)),
            config: Arc::new(config),
        })
    }
}
