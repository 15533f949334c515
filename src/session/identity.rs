//! Identity Provider Client
//!
//! OAuth 2.0 / OpenID Connect calls against the realm's endpoints:
//! - Authorization URL for the browser redirect
//! - Authorization code exchange
//! - Refresh token grant

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::error::{SessionError, SessionResult};
use super::token::TokenResponse;

/// Identity provider settings
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// Server base URL, e.g. "http://localhost:8082"
    pub url: String,
    pub realm: String,
    pub client_id: String,
    /// Confidential clients only
    pub client_secret: Option<String>,
    /// Where the provider sends the authorization code
    pub redirect_uri: String,
    pub scope: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8082".to_string(),
            realm: "nutrifit".to_string(),
            client_id: "diet-frontend".to_string(),
            client_secret: None,
            redirect_uri: "http://localhost:4200/callback".to_string(),
            scope: "openid profile email".to_string(),
        }
    }
}

impl IdentityConfig {
    fn realm_base(&self) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect",
            self.url.trim_end_matches('/'),
            self.realm
        )
    }

    pub fn authorize_endpoint(&self) -> String {
        format!("{}/auth", self.realm_base())
    }

    pub fn token_endpoint(&self) -> String {
        format!("{}/token", self.realm_base())
    }

    /// Authorization URL the user is sent to in order to log in
    pub fn authorize_url(&self) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}",
            self.authorize_endpoint(),
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&self.scope)
        )
    }
}

/// Token grants the session layer needs from an identity provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn config(&self) -> &IdentityConfig;

    /// Exchange an authorization code for a token set
    async fn exchange_code(&self, code: &str) -> SessionResult<TokenResponse>;

    /// Obtain a new token set from a refresh token
    async fn refresh(&self, refresh_token: &str) -> SessionResult<TokenResponse>;
}

/// OpenID Connect provider reached over HTTP
pub struct OidcProvider {
    client: Client,
    config: IdentityConfig,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: Option<String>,
    error_description: Option<String>,
}

impl OidcProvider {
    pub fn new(config: IdentityConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn with_client(client: Client, config: IdentityConfig) -> Self {
        Self { client, config }
    }

    async fn token_request<'a>(
        &'a self,
        mut form: Vec<(&'a str, &'a str)>,
    ) -> SessionResult<TokenResponse> {
        form.push(("client_id", &self.config.client_id));
        if let Some(secret) = self.config.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }

        let response = self
            .client
            .post(self.config.token_endpoint())
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let body: Option<OAuthErrorBody> = serde_json::from_str(&text).ok();
            let (error, description) = match body {
                Some(b) => (
                    b.error.unwrap_or_else(|| status.to_string()),
                    b.error_description,
                ),
                None if text.is_empty() => (status.to_string(), None),
                None => (text, None),
            };
            return Err(SessionError::Provider {
                status: status.as_u16(),
                error,
                description,
            });
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| SessionError::Parse(e.to_string()))
    }
}

#[async_trait]
impl IdentityProvider for OidcProvider {
    fn config(&self) -> &IdentityConfig {
        &self.config
    }

    async fn exchange_code(&self, code: &str) -> SessionResult<TokenResponse> {
        tracing::info!(code_len = code.len(), "Exchanging authorization code");

        self.token_request(vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &self.config.redirect_uri),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> SessionResult<TokenResponse> {
        tracing::info!("Refreshing access token");

        self.token_request(vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> IdentityConfig {
        IdentityConfig {
            url: server.uri(),
            realm: "nutrifit".to_string(),
            client_secret: Some("secret".to_string()),
            ..IdentityConfig::default()
        }
    }

    #[test]
    fn test_authorize_url() {
        let config = IdentityConfig::default();
        let url = config.authorize_url();
        assert!(url.starts_with(
            "http://localhost:8082/realms/nutrifit/protocol/openid-connect/auth?"
        ));
        assert!(url.contains("client_id=diet-frontend"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A4200%2Fcallback"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("scope=openid%20profile%20email"));
    }

    #[test]
    fn test_token_endpoint_trims_slash() {
        let config = IdentityConfig {
            url: "https://id.example.com/".to_string(),
            realm: "master".to_string(),
            ..IdentityConfig::default()
        };
        assert_eq!(
            config.token_endpoint(),
            "https://id.example.com/realms/master/protocol/openid-connect/token"
        );
    }

    #[tokio::test]
    async fn test_exchange_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/realms/nutrifit/protocol/openid-connect/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=abc123"))
            .and(body_string_contains("client_secret=secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "a.b.c",
                "refresh_token": "r-1",
                "expires_in": 300,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OidcProvider::new(config_for(&server));
        let tokens = provider.exchange_code("abc123").await.unwrap();
        assert_eq!(tokens.access_token, "a.b.c");
        assert_eq!(tokens.refresh_token.as_deref(), Some("r-1"));
        assert_eq!(tokens.expires_in, Some(300));
    }

    #[tokio::test]
    async fn test_refresh_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=r-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "access_token": "d.e.f"
                })),
            )
            .mount(&server)
            .await;

        let provider = OidcProvider::new(config_for(&server));
        let tokens = provider.refresh("r-1").await.unwrap();
        assert_eq!(tokens.access_token, "d.e.f");
        assert!(tokens.refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_provider_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Code not valid"
            })))
            .mount(&server)
            .await;

        let provider = OidcProvider::new(config_for(&server));
        match provider.exchange_code("stale").await {
            Err(SessionError::Provider {
                status,
                error,
                description,
            }) => {
                assert_eq!(status, 400);
                assert_eq!(error, "invalid_grant");
                assert_eq!(description.as_deref(), Some("Code not valid"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
