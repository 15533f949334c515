//! Token model
//!
//! Token endpoint responses, JWT claim decoding and the user identity
//! derived from it. Signatures are not verified here: the backend does
//! that. The client only needs the claims for display and expiry checks.

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body returned by the identity provider's token endpoint
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Roles granted at realm level
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RealmAccess {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// The subset of access token claims the client reads
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Claims {
    pub sub: Option<String>,
    pub email: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub name: Option<String>,
    pub preferred_username: Option<String>,
    /// Expiry, seconds since the epoch
    pub exp: Option<i64>,
    pub realm_access: Option<RealmAccess>,
}

impl Claims {
    /// A token without `exp` never expires client-side
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.exp {
            Some(exp) => exp.saturating_mul(1000) < now.timestamp_millis(),
            None => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.realm_access
            .as_ref()
            .map(|access| access.roles.iter().any(|r| r == role))
            .unwrap_or(false)
    }
}

/// Signed-in user, as persisted under the `user` key
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "preferred_username", skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    #[serde(default, rename = "given_name", skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, rename = "family_name", skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
}

impl User {
    pub fn from_claims(claims: &Claims) -> Self {
        Self {
            id: claims.sub.clone(),
            email: claims.email.clone(),
            first_name: claims.given_name.clone(),
            last_name: claims.family_name.clone(),
            name: claims
                .name
                .clone()
                .or_else(|| claims.preferred_username.clone()),
            preferred_username: claims.preferred_username.clone(),
            given_name: claims.given_name.clone(),
            family_name: claims.family_name.clone(),
        }
    }
}

/// A JWT has exactly three dot-separated parts
pub fn is_well_formed(token: &str) -> bool {
    token.split('.').count() == 3
}

/// Decode one base64 JWT segment, tolerating padding and either alphabet
pub fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    let trimmed = segment.trim_end_matches('=');
    URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
        .ok()
}

/// Decode the claims of a well-formed token
pub fn decode_claims(token: &str) -> Option<Claims> {
    let mut parts = token.split('.');
    let (Some(_), Some(payload), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };

    let bytes = decode_segment(payload)?;
    match serde_json::from_slice(&bytes) {
        Ok(claims) => Some(claims),
        Err(e) => {
            tracing::debug!("Token payload is not valid JSON: {}", e);
            None
        }
    }
}
