//! Listing canvas CLI
//!
//! Serves the HTTP API or processes local product photos.

#[cfg(feature = "cli")]
use listing_canvas::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
