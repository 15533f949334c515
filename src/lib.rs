//! # NutriFit
//!
//! Diet and fitness tracking: the static server that ships the single-page
//! application and its recipe images, the OAuth2 session layer that keeps
//! the user signed in, and typed clients for the backend features.
//!
//! ## Modules
//!
//! - [`web`]: SPA and image server with Axum
//! - [`session`]: token storage, code exchange, refresh, guard and interceptor
//! - [`client`]: recipes, day tracking, chat, profile, images, translations
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nutrifit::session::{AuthService, MemorySessionStore, OidcProvider, IdentityConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = Arc::new(OidcProvider::new(IdentityConfig::default()));
//!     let store = Arc::new(MemorySessionStore::new());
//!     let auth = AuthService::new(provider, store, "http://localhost:8080/api/public/auth");
//!
//!     // Send the user here, then feed the returned code to handle_callback
//!     println!("Log in at {}", auth.login_url());
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod logging;
pub mod session;
pub mod web;

pub use client::{
    ApiClient, ChatClient, ChatSession, ClientError, ClientResult, ImageClient, ProfileClient,
    RecipeClient, TrackingClient, TranslationClient,
};

pub use config::{Config, ConfigError, LoggingConfig};

pub use session::{
    AuthService, BearerInterceptor, CallbackOutcome, FileSessionStore, GuardDecision,
    IdentityConfig, MemorySessionStore, OidcProvider, RouteGuard, SessionError, SessionStore,
};

pub use web::{build_router, serve, AppState, WebConfig, WebError};
