//! Route Guard
//!
//! Decides whether navigation to an application route proceeds or is
//! sent to the identity provider's login page.

use std::sync::Arc;

use super::auth::AuthService;

/// Routes reachable without a session (prefix match)
pub const PUBLIC_ROUTES: [&str; 3] = ["/auth-landing", "/callback", "/login"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    RedirectToLogin { location: String },
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardDecision::Allow)
    }
}

pub struct RouteGuard {
    auth: Arc<AuthService>,
    public_routes: Vec<String>,
}

impl RouteGuard {
    pub fn new(auth: Arc<AuthService>) -> Self {
        Self {
            auth,
            public_routes: PUBLIC_ROUTES.iter().map(|r| r.to_string()).collect(),
        }
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.public_routes.iter().any(|r| path.starts_with(r.as_str()))
    }

    pub fn check(&self, path: &str) -> GuardDecision {
        if self.is_public(path) {
            tracing::debug!(route = %path, "Public route");
            return GuardDecision::Allow;
        }

        if self.auth.is_authenticated() {
            tracing::debug!(route = %path, "Authenticated, access granted");
            return GuardDecision::Allow;
        }

        tracing::warn!(route = %path, "Access denied, redirecting to login");
        GuardDecision::RedirectToLogin {
            location: self.auth.login_url(),
        }
    }
}
