//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::session::IdentityConfig;
use crate::web::WebConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub identity: IdentitySection,

    #[serde(default)]
    pub api: BackendConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Static file / SPA server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_spa_dir")]
    pub spa_dir: String,

    #[serde(default = "default_images_dir")]
    pub images_dir: String,

    /// Externally visible base URL, used in links returned by the health endpoint
    #[serde(default)]
    pub public_url: Option<String>,

    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_spa_dir() -> String {
    "dist/app-diet/browser".to_string()
}

fn default_images_dir() -> String {
    "public/images".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            spa_dir: default_spa_dir(),
            images_dir: default_images_dir(),
            public_url: None,
            cors_origins: Vec::new(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ServerConfig {
    /// Convert into the runtime configuration of the web server
    pub fn to_web_config(&self) -> WebConfig {
        let public_url = self
            .public_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", self.port));

        WebConfig {
            host: self.host.clone(),
            port: self.port,
            spa_dir: PathBuf::from(&self.spa_dir),
            images_dir: PathBuf::from(&self.images_dir),
            public_url,
            cors_origins: self.cors_origins.clone(),
            request_timeout_secs: self.request_timeout_secs,
            ..WebConfig::default()
        }
    }
}

/// Identity provider (OpenID Connect realm) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IdentitySection {
    #[serde(default = "default_identity_url")]
    pub url: String,

    #[serde(default = "default_realm")]
    pub realm: String,

    #[serde(default = "default_client_id")]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: Option<String>,

    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,

    #[serde(default = "default_scope")]
    pub scope: String,
}

fn default_identity_url() -> String {
    "http://localhost:8082".to_string()
}

fn default_realm() -> String {
    "nutrifit".to_string()
}

fn default_client_id() -> String {
    "diet-frontend".to_string()
}

fn default_redirect_uri() -> String {
    "http://localhost:4200/callback".to_string()
}

fn default_scope() -> String {
    "openid profile email".to_string()
}

impl Default for IdentitySection {
    fn default() -> Self {
        Self {
            url: default_identity_url(),
            realm: default_realm(),
            client_id: default_client_id(),
            client_secret: None,
            redirect_uri: default_redirect_uri(),
            scope: default_scope(),
        }
    }
}

impl IdentitySection {
    pub fn to_identity_config(&self) -> IdentityConfig {
        IdentityConfig {
            url: self.url.clone(),
            realm: self.realm.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone().filter(|s| !s.is_empty()),
            redirect_uri: self.redirect_uri.clone(),
            scope: self.scope.clone(),
        }
    }
}

/// Recipe/tracking backend configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the public API, bearer tokens are only attached below it
    #[serde(default = "default_api_url")]
    pub url: String,

    #[serde(default = "default_api_timeout")]
    pub request_timeout_ms: u64,
}

fn default_api_url() -> String {
    "http://localhost:8080/api/public/".to_string()
}

fn default_api_timeout() -> u64 {
    10_000
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_api_url(),
            request_timeout_ms: default_api_timeout(),
        }
    }
}

impl BackendConfig {
    /// Register/login endpoints
    pub fn auth_url(&self) -> String {
        format!("{}/auth", self.url.trim_end_matches('/'))
    }

    /// API root: `url` without its `/public` segment. Day tracking and
    /// translations are mounted here, and the bearer token is sent to
    /// everything below it.
    pub fn root_url(&self) -> String {
        let trimmed = self.url.trim_end_matches('/');
        trimmed.strip_suffix("/public").unwrap_or(trimmed).to_string()
    }

    /// Base for `TrackingClient`, which appends `day-tracking/...`
    pub fn tracking_url(&self) -> String {
        self.root_url()
    }

    pub fn translations_url(&self) -> String {
        format!("{}/v1/translations", self.root_url())
    }
}

/// Chat/AI microservice configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_chat_url")]
    pub url: String,

    #[serde(default = "default_chat_timeout")]
    pub request_timeout_ms: u64,
}

fn default_chat_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_chat_timeout() -> u64 {
    60_000
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            url: default_chat_url(),
            request_timeout_ms: default_chat_timeout(),
        }
    }
}

/// Session persistence configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_store_path")]
    pub store_path: String,
}

fn default_store_path() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("nutrifit").join("session.json").to_string_lossy().to_string())
        .unwrap_or_else(|| "./nutrifit_session.json".to_string())
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set
    pub fn filter_directive(&self) -> String {
        format!("nutrifit={},tower_http={}", self.level, self.level)
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths: Vec<PathBuf> = [
            dirs::config_dir().map(|p| p.join("nutrifit").join("config.toml")),
            Some(PathBuf::from("/etc/nutrifit/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect();

        Self::load_first(&config_paths)
    }

    /// First of `paths` that exists and parses; a broken file is skipped
    /// with a warning
    pub(crate) fn load_first(paths: &[PathBuf]) -> Self {
        for path_opt in paths {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Load an explicit file when given, default locations otherwise
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load_with_env(p),
            None => Ok(Self::load_default()),
        }
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from a variable lookup
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server overrides
        if let Some(host) = lookup("NUTRIFIT_HOST") {
            self.server.host = host;
        }
        // PORT is what hosting platforms set; the prefixed variable wins
        for key in ["PORT", "NUTRIFIT_PORT"] {
            if let Some(p) = lookup(key).and_then(|v| v.parse().ok()) {
                self.server.port = p;
            }
        }
        if let Some(dir) = lookup("NUTRIFIT_SPA_DIR") {
            self.server.spa_dir = dir;
        }
        if let Some(dir) = lookup("NUTRIFIT_IMAGES_DIR") {
            self.server.images_dir = dir;
        }
        if let Some(url) = lookup("NUTRIFIT_PUBLIC_URL") {
            self.server.public_url = Some(url);
        }

        // Identity provider overrides
        if let Some(url) = lookup("NUTRIFIT_IDENTITY_URL") {
            self.identity.url = url;
        }
        if let Some(realm) = lookup("NUTRIFIT_IDENTITY_REALM") {
            self.identity.realm = realm;
        }
        if let Some(client_id) = lookup("NUTRIFIT_CLIENT_ID") {
            self.identity.client_id = client_id;
        }
        if let Some(secret) = lookup("NUTRIFIT_CLIENT_SECRET") {
            self.identity.client_secret = Some(secret);
        }
        if let Some(uri) = lookup("NUTRIFIT_REDIRECT_URI") {
            self.identity.redirect_uri = uri;
        }

        // Remote service overrides
        if let Some(url) = lookup("NUTRIFIT_API_URL") {
            self.api.url = url;
        }
        if let Some(url) = lookup("NUTRIFIT_CHAT_URL") {
            self.chat.url = url;
        }
        if let Some(path) = lookup("NUTRIFIT_SESSION_FILE") {
            self.session.store_path = path;
        }

        // Logging overrides
        if let Some(level) = lookup("NUTRIFIT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("NUTRIFIT_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# NutriFit Configuration
#
# Environment variables override these settings:
# - PORT / NUTRIFIT_PORT, NUTRIFIT_HOST
# - NUTRIFIT_SPA_DIR, NUTRIFIT_IMAGES_DIR, NUTRIFIT_PUBLIC_URL
# - NUTRIFIT_IDENTITY_URL, NUTRIFIT_IDENTITY_REALM
# - NUTRIFIT_CLIENT_ID, NUTRIFIT_CLIENT_SECRET, NUTRIFIT_REDIRECT_URI
# - NUTRIFIT_API_URL, NUTRIFIT_CHAT_URL, NUTRIFIT_SESSION_FILE
# - NUTRIFIT_LOG_LEVEL, NUTRIFIT_LOG_FORMAT

[server]
host = "0.0.0.0"
port = 8080

# Compiled single-page application (index.html lives here)
spa_dir = "dist/app-diet/browser"

# Recipe images, served under /api/images/
images_dir = "public/images"

# Allowed CORS origins (empty = permissive)
cors_origins = []

request_timeout_secs = 30

[identity]
# OpenID Connect server and realm
url = "http://localhost:8082"
realm = "nutrifit"
client_id = "diet-frontend"
# client_secret = ""

# Where the provider sends the authorization code
redirect_uri = "http://localhost:4200/callback"
scope = "openid profile email"

[api]
# Backend base URL; bearer tokens are only sent to URLs below it
url = "http://localhost:8080/api/public/"
request_timeout_ms = 10000

[chat]
# Chat / recipe suggestion service
url = "http://localhost:8000/api"
request_timeout_ms = 60000

[session]
# Where tokens and chat history are persisted
# store_path = "~/.local/share/nutrifit/session.json"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.identity.realm, "nutrifit");
        assert_eq!(config.identity.client_id, "diet-frontend");
        assert!(config.identity.client_secret.is_none());
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::parse("[server]\nport = 3001\n").unwrap();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.api.url, "http://localhost:8080/api/public/");
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PORT", "9000"),
            ("NUTRIFIT_API_URL", "https://api.example.com/api/"),
            ("NUTRIFIT_CLIENT_SECRET", "s3cret"),
            ("NUTRIFIT_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.api.url, "https://api.example.com/api/");
        assert_eq!(config.identity.client_secret.as_deref(), Some("s3cret"));
        assert!(config.logging.is_json());
    }

    #[test]
    fn test_prefixed_port_wins() {
        let mut config = Config::default();
        config.apply_overrides(|k| match k {
            "PORT" => Some("9000".to_string()),
            "NUTRIFIT_PORT" => Some("9100".to_string()),
            _ => None,
        });
        assert_eq!(config.server.port, 9100);
    }

    #[test]
    fn test_empty_secret_is_dropped() {
        let section = IdentitySection {
            client_secret: Some(String::new()),
            ..IdentitySection::default()
        };
        assert!(section.to_identity_config().client_secret.is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_derived_backend_urls() {
        let api = BackendConfig::default();
        assert_eq!(api.auth_url(), "http://localhost:8080/api/public/auth");
        assert_eq!(
            api.translations_url(),
            "http://localhost:8080/api/v1/translations"
        );

        let api = BackendConfig {
            url: "https://diet.example.com/api".to_string(),
            ..BackendConfig::default()
        };
        assert_eq!(
            api.translations_url(),
            "https://diet.example.com/api/v1/translations"
        );
    }

    #[test]
    fn test_tracking_lives_under_api_root() {
        let api = BackendConfig {
            url: "http://localhost:8080/api/public/".to_string(),
            ..BackendConfig::default()
        };
        assert_eq!(api.root_url(), "http://localhost:8080/api");
        assert_eq!(api.tracking_url(), "http://localhost:8080/api");
        assert_eq!(
            crate::client::join_url(&api.tracking_url(), "day-tracking/2025-01-15"),
            "http://localhost:8080/api/day-tracking/2025-01-15"
        );
    }

    #[test]
    fn test_bearer_covers_public_and_root_routes() {
        use crate::session::{store, BearerInterceptor, MemorySessionStore, SessionStore};
        use reqwest::{Client, Method};
        use std::sync::Arc;

        let api = BackendConfig::default();
        let session = Arc::new(MemorySessionStore::new());
        session.set(store::ACCESS_TOKEN, "aaa.bbb.ccc").unwrap();
        let interceptor = BearerInterceptor::new(api.root_url(), session);

        let http = Client::new();
        for url in [
            format!("{}/day-tracking/2025-01-15", api.tracking_url()),
            format!("{}/recipes", api.url),
            format!("{}/fr/common", api.translations_url()),
        ] {
            let mut request = http.request(Method::GET, &url).build().unwrap();
            assert!(interceptor.intercept(&mut request), "no bearer for {}", url);
        }

        let mut chat = http
            .request(Method::POST, "http://localhost:8000/api/chat")
            .build()
            .unwrap();
        assert!(!interceptor.intercept(&mut chat));
    }

    #[test]
    fn test_public_url_defaults_to_port() {
        let server = ServerConfig {
            port: 3001,
            ..ServerConfig::default()
        };
        assert_eq!(server.to_web_config().public_url, "http://localhost:3001");
    }
}
