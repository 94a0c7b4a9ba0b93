//! HTTP service
//!
//! Axum router exposing the listing pipeline over multipart uploads.

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;
pub mod upload;

pub use error::{ApiError, ApiResult};
pub use router::build_router;
pub use state::AppState;
pub use upload::{UploadForm, UploadedFile};

use crate::config::ServiceConfig;
use crate::error::{CanvasError, Result};
use std::net::SocketAddr;
use tracing::info;

/// Bind and serve until Ctrl-C or SIGTERM
///
/// # Errors
/// - Invalid configuration or remover initialization failure
/// - Address already in use
pub async fn serve(config: ServiceConfig) -> Result<()> {
    let addr = config.bind_address();
    let state = AppState::new(config)?;
    let app = build_router(state.clone());

    let listener = tokio::net::TcpListener::bind(addr.as_str()).await?;
    info!(
        %addr,
        backend = state.processor.remover_name(),
        daily_limit = state.limiter.limit(),
        "listing-canvas listening"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| CanvasError::internal(format!("Server error: {e}")))?;

    info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for SIGINT or, on Unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT, starting graceful shutdown"),
        () = terminate => info!("Received SIGTERM, starting graceful shutdown"),
    }
}
