//! Profile Client
//!
//! Loads the signed-in user's profile from the backend and falls back to
//! the claims of the stored access token when the backend cannot answer.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use super::{ApiClient, ClientError};
use crate::session::store::{self, SessionStore, StoreError};
use crate::session::token::{self, Claims};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub email: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub username: String,
}

impl UserProfile {
    pub fn from_claims(claims: &Claims) -> Self {
        let or = |primary: &Option<String>, secondary: &Option<String>, fallback: &str| {
            primary
                .clone()
                .or_else(|| secondary.clone())
                .unwrap_or_else(|| fallback.to_string())
        };

        UserProfile {
            email: or(&claims.email, &claims.preferred_username, "N/A"),
            first_name: claims.given_name.clone().unwrap_or_else(|| "User".to_string()),
            last_name: claims.family_name.clone().unwrap_or_default(),
            username: or(&claims.preferred_username, &claims.sub, "N/A"),
        }
    }

    /// Real names are known, not the token fallback placeholder
    pub fn is_complete(&self) -> bool {
        self.first_name != "User"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileSource {
    Api,
    Token,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedProfile {
    pub profile: UserProfile,
    pub source: ProfileSource,
}

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("No authentication token")]
    NoToken,

    #[error("Token invalide")]
    InvalidToken,

    #[error("Impossible de décoder le token")]
    Undecodable,

    #[error("Token expiré")]
    Expired,

    #[error("Session store error: {0}")]
    Store(#[from] StoreError),
}

/// Client for `<api>/auth/profile`
pub struct ProfileClient {
    api: ApiClient,
    store: Arc<dyn SessionStore>,
}

impl ProfileClient {
    pub fn new(api: ApiClient, store: Arc<dyn SessionStore>) -> Self {
        Self { api, store }
    }

    pub async fn load(&self) -> Result<LoadedProfile, ProfileError> {
        let token = self
            .store
            .get(store::ACCESS_TOKEN)?
            .filter(|t| !t.is_empty())
            .ok_or(ProfileError::NoToken)?;

        match self.fetch(&token).await {
            Ok(profile) => {
                tracing::info!("Profile loaded from API");
                Ok(LoadedProfile {
                    profile,
                    source: ProfileSource::Api,
                })
            }
            Err(e) => {
                tracing::warn!(status = ?e.status(), "Profile API failed, using token claims");
                Ok(LoadedProfile {
                    profile: Self::from_token(&token)?,
                    source: ProfileSource::Token,
                })
            }
        }
    }

    async fn fetch(&self, token: &str) -> Result<UserProfile, ClientError> {
        let request = self
            .api
            .request(Method::GET, "auth/profile")
            .bearer_auth(token);
        self.api.send_json(request).await
    }

    /// Profile built from the access token alone
    pub fn from_token(token: &str) -> Result<UserProfile, ProfileError> {
        if !token::is_well_formed(token) {
            return Err(ProfileError::InvalidToken);
        }
        let claims = token::decode_claims(token).ok_or(ProfileError::Undecodable)?;
        if claims.is_expired() {
            return Err(ProfileError::Expired);
        }
        Ok(UserProfile::from_claims(&claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::{authed_client, TOKEN};
    use crate::session::token::testing::make_token;
    use crate::session::MemorySessionStore;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_with_token(base: &str, token: &str) -> ProfileClient {
        let (api, store) = authed_client(base);
        store.set(store::ACCESS_TOKEN, token).unwrap();
        ProfileClient::new(api, store)
    }

    #[tokio::test]
    async fn test_profile_from_api() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/public/auth/profile"))
            .and(header("authorization", format!("Bearer {}", TOKEN).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "email": "ana@example.com",
                "firstName": "Ana",
                "lastName": "Lopez",
                "username": "ana"
            })))
            .mount(&server)
            .await;

        let (api, store) = authed_client(&format!("{}/api/public/", server.uri()));
        let loaded = ProfileClient::new(api, store).load().await.unwrap();
        assert_eq!(loaded.source, ProfileSource::Api);
        assert_eq!(loaded.profile.first_name, "Ana");
        assert!(loaded.profile.is_complete());
    }

    #[tokio::test]
    async fn test_falls_back_to_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let token = make_token(json!({
            "sub": "u-7",
            "preferred_username": "karim",
            "exp": chrono::Utc::now().timestamp() + 600
        }));
        let client = client_with_token(&format!("{}/api/public/", server.uri()), &token);

        let loaded = client.load().await.unwrap();
        assert_eq!(loaded.source, ProfileSource::Token);
        assert_eq!(
            loaded.profile,
            UserProfile {
                email: "karim".into(),
                first_name: "User".into(),
                last_name: "".into(),
                username: "karim".into(),
            }
        );
        assert!(!loaded.profile.is_complete());
    }

    #[tokio::test]
    async fn test_expired_token_fallback_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let token = make_token(json!({ "sub": "u-7", "exp": 1_000 }));
        let client = client_with_token(&format!("{}/api/public/", server.uri()), &token);
        assert!(matches!(client.load().await, Err(ProfileError::Expired)));
    }

    #[tokio::test]
    async fn test_no_token() {
        let api = ApiClient::new("http://127.0.0.1:1/api/public/", 1_000, None).unwrap();
        let client = ProfileClient::new(api, Arc::new(MemorySessionStore::new()));
        assert!(matches!(client.load().await, Err(ProfileError::NoToken)));
    }

    #[test]
    fn test_from_token_rejects_malformed() {
        assert!(matches!(
            ProfileClient::from_token("not-a-jwt"),
            Err(ProfileError::InvalidToken)
        ));
        assert!(matches!(
            ProfileClient::from_token("a.%%%.c"),
            Err(ProfileError::Undecodable)
        ));
    }

    #[test]
    fn test_claims_with_sub_only() {
        let claims = Claims {
            sub: Some("u-1".into()),
            ..Claims::default()
        };
        let profile = UserProfile::from_claims(&claims);
        assert_eq!(profile.email, "N/A");
        assert_eq!(profile.username, "u-1");
    }
}
