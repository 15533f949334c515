//! Backend API Clients
//!
//! Typed clients for the recipe/tracking backend and the chat service.
//! Every request is passed through the [`BearerInterceptor`] before it
//! leaves, so backend calls carry the session token and external calls
//! do not.
//!
//! - [`recipes`]: recipe catalogue and AI generation
//! - [`tracking`]: daily meals, workouts and calorie totals
//! - [`chat`]: nutrition coach conversation
//! - [`profile`]: user profile with token fallback
//! - [`images`]: image URLs and uploads
//! - [`translations`]: UI strings per language

pub mod chat;
pub mod images;
pub mod profile;
pub mod recipes;
pub mod tracking;
pub mod translations;

pub use chat::{ChatClient, ChatSession};
pub use images::ImageClient;
pub use profile::ProfileClient;
pub use recipes::RecipeClient;
pub use tracking::TrackingClient;
pub use translations::TranslationClient;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::session::{BearerInterceptor, StoreError};

/// Errors that can occur when talking to the backend or chat service
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Service unavailable")]
    Unavailable,

    #[error("Request timeout")]
    Timeout,

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// 401/403 from the backend
    #[error("Unauthorized ({status})")]
    Unauthorized { status: u16 },

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    Decode(String),

    /// Local persistence (chat history) failed
    #[error("Session store error: {0}")]
    Store(#[from] StoreError),
}

impl ClientError {
    fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Timeout
        } else if e.is_connect() {
            ClientError::Unavailable
        } else {
            ClientError::Request(e)
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Unauthorized { status } | ClientError::Api { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Join a base URL and a relative path with exactly one slash
pub fn join_url(base: &str, path: &str) -> String {
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return base.trim_end_matches('/').to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), path)
}

/// HTTP client bound to one base URL
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    interceptor: Option<Arc<BearerInterceptor>>,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        request_timeout_ms: u64,
        interceptor: Option<Arc<BearerInterceptor>>,
    ) -> ClientResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(request_timeout_ms))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            interceptor,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    /// Start a request relative to the base URL
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path))
    }

    /// Intercept, send and check the status of a request
    pub async fn execute(&self, builder: RequestBuilder) -> ClientResult<Response> {
        let mut request = builder.build()?;
        if let Some(interceptor) = &self.interceptor {
            interceptor.intercept(&mut request);
        }

        let method = request.method().clone();
        let url = request.url().to_string();
        tracing::debug!(method = %method, url = %url, "Sending request");

        let response = self
            .http
            .execute(request)
            .await
            .map_err(ClientError::from_transport)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        tracing::warn!(method = %method, url = %url, status = status.as_u16(), "Request failed");

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ClientError::Unauthorized {
                status: status.as_u16(),
            });
        }

        let message = response.text().await.unwrap_or_default();
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// Send and decode a JSON body
    pub async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ClientResult<T> {
        let response = self.execute(builder).await?;
        let text = response.text().await.map_err(ClientError::from_transport)?;
        serde_json::from_str(&text).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Send and ignore the body
    pub async fn send_empty(&self, builder: RequestBuilder) -> ClientResult<()> {
        self.execute(builder).await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::session::{store, MemorySessionStore, SessionStore};

    pub const TOKEN: &str = "aaa.bbb.ccc";

    /// Client for `base` whose interceptor holds a stored token
    pub fn authed_client(base: &str) -> (ApiClient, Arc<MemorySessionStore>) {
        let store = Arc::new(MemorySessionStore::new());
        store.set(store::ACCESS_TOKEN, TOKEN).unwrap();
        let interceptor = Arc::new(BearerInterceptor::new(base, store.clone()));
        (ApiClient::new(base, 5_000, Some(interceptor)).unwrap(), store)
    }
}
