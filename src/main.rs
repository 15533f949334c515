//! NutriFit Server
//!
//! Serves the built single-page application and the recipe images.
//!
//! Run with: cargo run --bin nutrifit
//!
//! # Configuration
//!
//! Read from `NUTRIFIT_CONFIG` when set, the default locations otherwise.
//! Environment variables:
//! - `PORT` / `NUTRIFIT_PORT`: Port to listen on (default: 8080)
//! - `NUTRIFIT_HOST`: Host to bind to (default: 0.0.0.0)
//! - `NUTRIFIT_SPA_DIR`: Built application (default: dist/app-diet/browser)
//! - `NUTRIFIT_IMAGES_DIR`: Images served under /api/images (default: public/images)
//! - `NUTRIFIT_PUBLIC_URL`: Base URL used in links (default: http://localhost:<port>)
//! - `RUST_LOG`: Log filter (default from `[logging]`)

use nutrifit::config::Config;
use nutrifit::web::{serve, AppState};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::var("NUTRIFIT_CONFIG").ok().map(PathBuf::from);
    let config = nutrifit::logging::with_bootstrap(|| Config::resolve(config_path.as_deref()))?;

    nutrifit::logging::init(&config.logging);

    tracing::info!("Starting NutriFit server v{}", env!("CARGO_PKG_VERSION"));

    let web_config = config.server.to_web_config();
    tracing::info!("Application: {:?}", web_config.spa_dir);
    tracing::info!("Images: {:?}", web_config.images_dir);

    let state = AppState::new(web_config.clone());
    serve(state, &web_config).await?;

    tracing::info!("NutriFit server stopped");
    Ok(())
}
