//! Bearer Interceptor
//!
//! Attaches the stored access token to outgoing requests aimed at the
//! backend API. Requests to any other host (chat service, image CDNs,
//! the identity provider itself) leave untouched.

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::Request;
use std::sync::Arc;

use super::store::{self, SessionStore};

pub struct BearerInterceptor {
    api_base: String,
    store: Arc<dyn SessionStore>,
}

impl BearerInterceptor {
    pub fn new(api_base: impl Into<String>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            api_base: api_base.into(),
            store,
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Returns whether an Authorization header was attached
    pub fn intercept(&self, request: &mut Request) -> bool {
        let url = request.url().as_str();
        if !url.starts_with(&self.api_base) {
            tracing::trace!(url = %url, "External request, no token");
            return false;
        }

        let token = match self.store.get(store::ACCESS_TOKEN) {
            Ok(Some(token)) if !token.is_empty() => token,
            Ok(_) => {
                tracing::debug!(url = %url, "No token for backend request");
                return false;
            }
            Err(e) => {
                tracing::warn!("Could not read access token: {}", e);
                return false;
            }
        };

        match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(mut value) => {
                value.set_sensitive(true);
                tracing::debug!(url = %url, "Attached bearer token");
                request.headers_mut().insert(AUTHORIZATION, value);
                true
            }
            Err(_) => {
                tracing::warn!("Stored token is not a valid header value");
                false
            }
        }
    }
}
