//! Server State
//!
//! Shared state accessible by the web handlers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<WebConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: WebConfig) -> Self {
        Self {
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Whether the SPA entry point is on disk
    pub fn has_index(&self) -> bool {
        self.config.index_path().is_file()
    }
}

/// Web server configuration
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Built single-page application
    pub spa_dir: PathBuf,
    /// Entry point served for client-side routes
    pub index_file: String,
    /// Directory exposed under /api/images
    pub images_dir: PathBuf,
    /// Externally visible base URL, used to build image links
    pub public_url: String,
    /// Image advertised by /api/health
    pub sample_image: String,
    /// Allowed CORS origins; empty means any origin
    pub cors_origins: Vec<String>,
    pub request_timeout_secs: u64,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            spa_dir: PathBuf::from("dist/app-diet/browser"),
            index_file: "index.html".to_string(),
            images_dir: PathBuf::from("public/images"),
            public_url: "http://localhost:8080".to_string(),
            sample_image: "msemen-miel.jpg".to_string(),
            cors_origins: Vec::new(),
            request_timeout_secs: 30,
        }
    }
}

impl WebConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn index_path(&self) -> PathBuf {
        self.spa_dir.join(&self.index_file)
    }

    /// Public URL of a file in the images directory
    pub fn image_url(&self, file: &str) -> String {
        format!(
            "{}/api/images/{}",
            self.public_url.trim_end_matches('/'),
            file
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_url() {
        let config = WebConfig {
            public_url: "http://localhost:3001/".to_string(),
            ..WebConfig::default()
        };
        assert_eq!(
            config.image_url("msemen-miel.jpg"),
            "http://localhost:3001/api/images/msemen-miel.jpg"
        );
        assert_eq!(config.addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_index_path() {
        let config = WebConfig::default();
        assert_eq!(
            config.index_path(),
            PathBuf::from("dist/app-diet/browser/index.html")
        );
    }
}
