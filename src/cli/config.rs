//! Conversion of CLI arguments into library configuration

use crate::canvas::CanvasSpec;
use crate::cli::main_impl::{ProcessArgs, RemovalArgs, ServeArgs};
use crate::config::ServiceConfig;
use crate::server::UploadForm;
use anyhow::{Context, Result};
use std::collections::HashMap;

pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Environment configuration with `.env` support
    fn from_env() -> Result<ServiceConfig> {
        // A missing .env file is normal
        let _ = dotenvy::dotenv();
        ServiceConfig::from_env().context("Failed to load configuration from environment")
    }

    fn apply_removal(config: &mut ServiceConfig, args: &RemovalArgs) {
        if let Some(backend) = args.removal_backend {
            config.removal_backend = backend;
        }
        if let Some(path) = &args.model_path {
            config.model_path = Some(path.clone());
        }
        if args.strict {
            config.strict_removal = true;
        }
    }

    /// Service configuration for `serve`
    pub(crate) fn for_serve(args: &ServeArgs) -> Result<ServiceConfig> {
        let mut config = Self::from_env()?;
        if let Some(host) = &args.host {
            config.host.clone_from(host);
        }
        if let Some(port) = args.port {
            config.port = port;
        }
        Self::apply_removal(&mut config, &args.removal);
        config.validate().context("Invalid server configuration")?;
        Ok(config)
    }

    /// Service configuration for local processing
    pub(crate) fn for_process(args: &ProcessArgs) -> Result<ServiceConfig> {
        let mut config = Self::from_env()?;
        Self::apply_removal(&mut config, &args.removal);
        config.validate().context("Invalid processing configuration")?;
        Ok(config)
    }

    /// Canvas settings from the same fields the HTTP form accepts
    pub(crate) fn canvas_spec(args: &ProcessArgs, config: &ServiceConfig) -> Result<CanvasSpec> {
        let mut fields = HashMap::new();
        if let Some(color) = &args.bg_color {
            fields.insert("bg_color".to_string(), color.clone());
        }
        if args.shadow {
            fields.insert("add_shadow".to_string(), "true".to_string());
        }
        if let Some(category) = &args.category {
            fields.insert("category".to_string(), category.clone());
        }

        let base = CanvasSpec::from(&config.canvas);
        UploadForm::from_parts(Vec::new(), fields)
            .canvas_spec(&base)
            .context("Invalid canvas options")
    }
}
