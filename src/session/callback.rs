//! OAuth2 Callback Handler
//!
//! Processes the identity provider's redirect: reads `code` / `error`
//! from the query string, exchanges the code, saves the tokens and checks
//! they actually landed in the store before reporting success.
//!
//! [`callback_router`] exposes the handler on `GET /callback` so a local
//! listener can receive the redirect during a command-line login.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use super::auth::AuthService;
use super::store;
use super::{DASHBOARD_ROUTE, LANDING_ROUTE};

/// Query parameters of the redirect
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Authenticated { redirect: String },
    Failed { message: String, redirect: String },
}

impl CallbackOutcome {
    fn failed(message: impl Into<String>) -> Self {
        CallbackOutcome::Failed {
            message: message.into(),
            redirect: LANDING_ROUTE.to_string(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, CallbackOutcome::Authenticated { .. })
    }

    pub fn redirect(&self) -> &str {
        match self {
            CallbackOutcome::Authenticated { redirect } => redirect,
            CallbackOutcome::Failed { redirect, .. } => redirect,
        }
    }
}

/// Run the redirect through the code exchange and token persistence
pub async fn handle_callback(auth: &AuthService, params: CallbackParams) -> CallbackOutcome {
    tracing::info!(has_code = params.code.is_some(), "Processing login callback");

    if let Some(error) = params.error {
        tracing::error!(
            error = %error,
            description = params.error_description.as_deref().unwrap_or(""),
            "Identity provider returned an error"
        );
        return CallbackOutcome::failed(format!("Erreur: {}", error));
    }

    let code = match params.code.filter(|c| !c.is_empty()) {
        Some(code) => code,
        None => {
            tracing::error!("No authorization code in callback");
            return CallbackOutcome::failed("Erreur: Code d'autorisation manquant");
        }
    };

    let response = match auth.handle_callback(&code).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!("Code exchange failed: {}", e);
            return CallbackOutcome::failed(format!("Erreur d'authentification: {}", e.detail()));
        }
    };

    if response.access_token.is_empty() {
        tracing::error!("Token response carried no access_token");
        return CallbackOutcome::failed("Erreur: Token non reçu");
    }

    if let Err(e) = auth.save_response(&response) {
        tracing::error!("Could not save tokens: {}", e);
        return CallbackOutcome::failed("Erreur: Sauvegarde du token échouée");
    }

    match auth.store().get(store::ACCESS_TOKEN) {
        Ok(Some(saved)) => {
            tracing::info!(
                token_len = saved.len(),
                token_parts = saved.split('.').count(),
                "Token verified in store"
            );
        }
        _ => {
            tracing::error!("Token missing from store after save");
            return CallbackOutcome::failed("Erreur: Sauvegarde du token échouée");
        }
    }

    CallbackOutcome::Authenticated {
        redirect: DASHBOARD_ROUTE.to_string(),
    }
}

#[derive(Clone)]
struct CallbackState {
    auth: Arc<AuthService>,
    outcomes: Arc<Mutex<Option<mpsc::Sender<CallbackOutcome>>>>,
}

/// Router serving `GET /callback`; the first outcome is sent on `outcomes`
pub fn callback_router(auth: Arc<AuthService>, outcomes: mpsc::Sender<CallbackOutcome>) -> Router {
    let state = CallbackState {
        auth,
        outcomes: Arc::new(Mutex::new(Some(outcomes))),
    };

    Router::new()
        .route("/callback", get(callback_endpoint))
        .with_state(state)
}

async fn callback_endpoint(
    State(state): State<CallbackState>,
    Query(params): Query<CallbackParams>,
) -> impl IntoResponse {
    let outcome = handle_callback(&state.auth, params).await;

    let (status, body) = match &outcome {
        CallbackOutcome::Authenticated { .. } => (
            StatusCode::OK,
            "Authentification réussie! Vous pouvez fermer cette fenêtre.".to_string(),
        ),
        CallbackOutcome::Failed { message, .. } => (StatusCode::BAD_REQUEST, message.clone()),
    };

    if let Some(tx) = state.outcomes.lock().await.take() {
        if tx.send(outcome).await.is_err() {
            tracing::warn!("Nobody is waiting for the login outcome");
        }
    }

    (status, body)
}
