//! Session Management
//!
//! Client-side credential lifecycle against an OpenID Connect provider.
//!
//! ## Architecture
//!
//! - **Store**: key/value persistence for tokens and chat history
//! - **Identity**: authorization URL, code exchange and refresh grants
//! - **AuthService**: saves, validates, refreshes and clears the bearer token
//! - **Interceptor**: adds `Authorization: Bearer` to backend requests
//! - **Guard**: lets protected routes through only with a session
//! - **Callback**: turns the provider redirect into a stored session
//!
//! ## Flow
//!
//! 1. A protected route without a token is redirected to [`AuthService::login_url`]
//! 2. The provider redirects back to `/callback?code=...`
//! 3. [`handle_callback`] exchanges the code and saves the tokens
//! 4. Every backend request goes through the [`BearerInterceptor`]

mod auth;
mod callback;
mod error;
mod guard;
mod identity;
mod interceptor;
pub mod store;
pub mod token;

pub use auth::{AuthMessage, AuthService, LoginResponse};
pub use callback::{callback_router, handle_callback, CallbackOutcome, CallbackParams};
pub use error::{SessionError, SessionResult};
pub use guard::{GuardDecision, RouteGuard, PUBLIC_ROUTES};
pub use identity::{IdentityConfig, IdentityProvider, OidcProvider};
pub use interceptor::BearerInterceptor;
pub use store::{FileSessionStore, MemorySessionStore, SessionStore, StoreError};
pub use token::{Claims, TokenResponse, User};

/// Where users land after logout or a failed login
pub const LANDING_ROUTE: &str = "/auth-landing";

/// Where users land after a successful login
pub const DASHBOARD_ROUTE: &str = "/dashboard";
