//! Auth Service
//!
//! Owns the bearer credential: acquires it through the identity provider,
//! persists it in the session store, answers "am I signed in?" questions
//! and refreshes it on demand. Every token change is published on a
//! watch channel so long-lived components can react to login/logout.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

use super::error::{SessionError, SessionResult};
use super::identity::IdentityProvider;
use super::store::{self, SessionStore};
use super::token::{self, Claims, TokenResponse, User};
use super::LANDING_ROUTE;

const FALLBACK_NAME: &str = "Utilisateur";

/// Body of the backend's register/login answers
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthMessage {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Direct (password) login answer from the backend
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest<'a> {
    email: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Session credential lifecycle
pub struct AuthService {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn SessionStore>,
    http: Client,
    /// Backend auth base, e.g. "http://host/api/public/auth"
    backend_auth_url: String,
    token_tx: watch::Sender<Option<String>>,
}

impl AuthService {
    /// Create the service and publish any token already persisted
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn SessionStore>,
        backend_auth_url: impl Into<String>,
    ) -> Self {
        let initial = match store.get(store::ACCESS_TOKEN) {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!("Could not read persisted token: {}", e);
                None
            }
        };

        match &initial {
            Some(_) => tracing::debug!("Loaded persisted access token"),
            None => tracing::debug!("No persisted access token"),
        }

        let (token_tx, _) = watch::channel(initial);

        Self {
            provider,
            store,
            http: Client::new(),
            backend_auth_url: backend_auth_url.into().trim_end_matches('/').to_string(),
            token_tx,
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Receive every token change (None after logout)
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.token_tx.subscribe()
    }

    /// Where to send the user to log in
    pub fn login_url(&self) -> String {
        self.provider.config().authorize_url()
    }

    /// Exchange the authorization code received on the redirect
    pub async fn handle_callback(&self, code: &str) -> SessionResult<TokenResponse> {
        self.provider.exchange_code(code).await
    }

    /// Persist a token set and publish the new access token.
    ///
    /// Empty refresh/id tokens are skipped, an empty access token is refused.
    pub fn save_token(
        &self,
        access_token: &str,
        refresh_token: &str,
        id_token: &str,
        user: Option<&User>,
    ) -> SessionResult<()> {
        if access_token.is_empty() {
            tracing::error!("Refusing to save an empty access token");
            return Err(SessionError::EmptyToken);
        }

        self.store.set(store::ACCESS_TOKEN, access_token)?;
        if !refresh_token.is_empty() {
            self.store.set(store::REFRESH_TOKEN, refresh_token)?;
        }
        if !id_token.is_empty() {
            self.store.set(store::ID_TOKEN, id_token)?;
        }
        if let Some(user) = user {
            self.store.set(store::USER, &serde_json::to_string(user)?)?;
        }

        tracing::info!(
            token_len = access_token.len(),
            token_parts = access_token.split('.').count(),
            has_refresh = !refresh_token.is_empty(),
            "Saved session tokens"
        );

        self.token_tx.send_replace(Some(access_token.to_string()));
        Ok(())
    }

    /// Persist a token endpoint response
    pub fn save_response(&self, response: &TokenResponse) -> SessionResult<()> {
        self.save_token(
            &response.access_token,
            response.refresh_token.as_deref().unwrap_or_default(),
            response.id_token.as_deref().unwrap_or_default(),
            None,
        )
    }

    /// Forget every credential; returns the route to land on
    pub fn logout(&self) -> SessionResult<&'static str> {
        for key in store::AUTH_KEYS {
            self.store.remove(key)?;
        }
        self.token_tx.send_replace(None);
        tracing::info!("Session cleared");
        Ok(LANDING_ROUTE)
    }

    /// Current access token, persisted value first
    pub fn token(&self) -> Option<String> {
        match self.store.get(store::ACCESS_TOKEN) {
            Ok(Some(token)) => Some(token),
            Ok(None) => self.token_tx.borrow().clone(),
            Err(e) => {
                tracing::warn!("Could not read access token: {}", e);
                self.token_tx.borrow().clone()
            }
        }
    }

    /// A token is present and has the shape of a JWT
    pub fn is_authenticated(&self) -> bool {
        match self.token() {
            Some(token) if token::is_well_formed(&token) => true,
            Some(token) => {
                tracing::warn!(parts = token.split('.').count(), "Stored token is malformed");
                false
            }
            None => false,
        }
    }

    /// Well formed, decodable and not expired
    pub fn is_token_valid(&self) -> bool {
        self.claims().map(|c| !c.is_expired()).unwrap_or(false)
    }

    fn claims(&self) -> Option<Claims> {
        let token = self.token()?;
        if !token::is_well_formed(&token) {
            return None;
        }
        token::decode_claims(&token)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.claims().map(|c| c.has_role(role)).unwrap_or(false)
    }

    /// Authorization header for manual requests
    pub fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(token) = self.token() {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => tracing::warn!("Stored token is not a valid header value"),
            }
        }
        headers
    }

    /// Trade the stored refresh token for a new token set and persist it
    pub async fn refresh_token(&self) -> SessionResult<TokenResponse> {
        let refresh = self
            .store
            .get(store::REFRESH_TOKEN)?
            .filter(|t| !t.is_empty())
            .ok_or(SessionError::NoRefreshToken)?;

        let mut response = self.provider.refresh(&refresh).await?;
        if response.refresh_token.is_none() {
            response.refresh_token = Some(refresh);
        }

        self.save_response(&response)?;
        Ok(response)
    }

    /// Stored user, or the identity carried by a live token
    pub fn current_user(&self) -> Option<User> {
        match self.store.get(store::USER) {
            Ok(Some(raw)) => match serde_json::from_str::<User>(&raw) {
                Ok(user) => return Some(user),
                Err(e) => tracing::warn!("Stored user is not valid JSON: {}", e),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!("Could not read stored user: {}", e),
        }

        let claims = self.claims()?;
        if claims.is_expired() {
            tracing::warn!("Token is expired, no current user");
            return None;
        }
        Some(User::from_claims(&claims))
    }

    pub fn user_first_name(&self) -> String {
        let user = self.current_user().unwrap_or_default();
        user.first_name
            .or(user.given_name)
            .or_else(|| {
                user.name
                    .as_deref()
                    .and_then(|n| n.split_whitespace().next())
                    .map(str::to_string)
            })
            .or(user.preferred_username)
            .unwrap_or_else(|| FALLBACK_NAME.to_string())
    }

    pub fn user_full_name(&self) -> String {
        let Some(user) = self.current_user() else {
            return FALLBACK_NAME.to_string();
        };

        let first = user.first_name.or(user.given_name).unwrap_or_default();
        let last = user.last_name.or(user.family_name).unwrap_or_default();
        if !first.is_empty() && !last.is_empty() {
            return format!("{} {}", first, last);
        }

        user.name
            .or(user.preferred_username)
            .unwrap_or_else(|| FALLBACK_NAME.to_string())
    }

    pub fn user_email(&self) -> Option<String> {
        self.current_user().and_then(|u| u.email)
    }

    /// Create an account through the backend
    pub async fn register(
        &self,
        email: &str,
        first_name: &str,
        last_name: &str,
        password: &str,
    ) -> SessionResult<AuthMessage> {
        tracing::info!(email = %email, "Sending registration request");

        let response = self
            .http
            .post(format!("{}/register", self.backend_auth_url))
            .json(&RegisterRequest {
                email,
                first_name,
                last_name,
                password,
            })
            .send()
            .await?;

        let status = response.status();
        let body: AuthMessage = response.json().await.unwrap_or_default();
        if !status.is_success() || !body.success {
            return Err(SessionError::AuthFailed(
                body.message.unwrap_or_else(|| status.to_string()),
            ));
        }
        Ok(body)
    }

    /// Password login through the backend; the returned tokens are saved
    pub async fn login_direct(&self, email: &str, password: &str) -> SessionResult<LoginResponse> {
        tracing::info!(email = %email, "Sending login request");

        let response = self
            .http
            .post(format!("{}/login", self.backend_auth_url))
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        let status = response.status();
        let body: LoginResponse = response.json().await.unwrap_or_default();
        let token = match body.token.as_deref() {
            Some(token) if status.is_success() && body.success => token,
            _ => {
                return Err(SessionError::AuthFailed(
                    body.message.clone().unwrap_or_else(|| status.to_string()),
                ))
            }
        };

        self.save_token(
            token,
            body.refresh_token.as_deref().unwrap_or_default(),
            "",
            None,
        )?;
        Ok(body)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::session::identity::IdentityConfig;
    use crate::session::store::MemorySessionStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Provider answering from canned results
    pub struct FakeProvider {
        pub config: IdentityConfig,
        pub exchange: Mutex<Option<SessionResult<TokenResponse>>>,
        pub refreshed: Mutex<Option<SessionResult<TokenResponse>>>,
    }

    impl FakeProvider {
        pub fn new() -> Self {
            Self {
                config: IdentityConfig::default(),
                exchange: Mutex::new(None),
                refreshed: Mutex::new(None),
            }
        }

        pub fn on_exchange(self, result: SessionResult<TokenResponse>) -> Self {
            *self.exchange.lock().unwrap() = Some(result);
            self
        }

        pub fn on_refresh(self, result: SessionResult<TokenResponse>) -> Self {
            *self.refreshed.lock().unwrap() = Some(result);
            self
        }
    }

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        fn config(&self) -> &IdentityConfig {
            &self.config
        }

        async fn exchange_code(&self, _code: &str) -> SessionResult<TokenResponse> {
            self.exchange
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(SessionError::Parse("no canned exchange".into())))
        }

        async fn refresh(&self, _refresh_token: &str) -> SessionResult<TokenResponse> {
            self.refreshed
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(SessionError::Parse("no canned refresh".into())))
        }
    }

    pub fn auth_with(provider: FakeProvider) -> (AuthService, Arc<MemorySessionStore>) {
        let store = Arc::new(MemorySessionStore::new());
        let auth = AuthService::new(
            Arc::new(provider),
            store.clone(),
            "http://localhost:8080/api/public/auth",
        );
        (auth, store)
    }
}
