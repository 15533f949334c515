//! Nutrition Coach Chat
//!
//! Client for the external chat/AI service and the persisted
//! conversation built on top of it. The chat service lives outside the
//! backend API, so its requests never carry the session token.

use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ApiClient, ClientError, ClientResult};
use crate::session::store::{self, SessionStore};

pub const GREETING: &str =
    "Bonjour ! Je suis ton coach nutrition IA. Comment puis-je t'aider aujourd'hui ?";
pub const APOLOGY: &str =
    "Désolé, une erreur est survenue. Réessaie dans un instant ou reformule ta question.";
pub const IMAGE_ERROR: &str = "Erreur analyse image. Réessaie.";

/// Words that send a message to recipe suggestion instead of plain chat
const RECIPE_KEYWORDS: [&str; 2] = ["recette", "plat"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of history sent with a chat request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub provider: String,
}

/// Recipe suggested by the coach; `id` is set once it exists in the catalogue
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedRecipe {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_in_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipeSuggestions {
    #[serde(default)]
    pub intro: String,
    #[serde(default)]
    pub recipes: Vec<SuggestedRecipe>,
}

/// Recipe returned by the generate endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneratedRecipe {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Image attached to an analysis request
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    session_id: &'a str,
    history: &'a [HistoryTurn],
}

/// Client for the chat service
pub struct ChatClient {
    api: ApiClient,
}

impl ChatClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn send_message(
        &self,
        text: &str,
        session_id: &str,
        history: &[HistoryTurn],
    ) -> ClientResult<ChatResponse> {
        let body = ChatRequest {
            message: text,
            session_id,
            history,
        };
        let request = self.api.request(Method::POST, "chat").json(&body);
        self.api.send_json(request).await
    }

    pub async fn suggest_recipes(&self, prompt: &str) -> ClientResult<RecipeSuggestions> {
        let request = self
            .api
            .request(Method::POST, "recipes/suggest")
            .json(&serde_json::json!({ "message": prompt }));
        self.api.send_json(request).await
    }

    /// Generate and store a full recipe, e.g. for a suggestion without an id
    pub async fn generate_recipe(&self, prompt: &str) -> ClientResult<GeneratedRecipe> {
        let request = self
            .api
            .request(Method::POST, "recipes/generate")
            .json(&serde_json::json!({ "prompt": prompt }));
        self.api.send_json(request).await
    }

    pub async fn analyze_images(
        &self,
        images: Vec<ImageUpload>,
        prompt: Option<&str>,
    ) -> ClientResult<RecipeSuggestions> {
        let mut form = Form::new();
        for image in images {
            form = form.part("images", Part::bytes(image.bytes).file_name(image.file_name));
        }
        if let Some(prompt) = prompt.map(str::trim).filter(|p| !p.is_empty()) {
            form = form.text("prompt", prompt.to_string());
        }

        let request = self
            .api
            .request(Method::POST, "chat/recipes-from-images")
            .multipart(form);
        self.api.send_json(request).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Bot,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub from: Sender,
    #[serde(default)]
    pub text: Option<String>,
    /// Local wall clock, HH:MM
    pub time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipes: Option<Vec<SuggestedRecipe>>,
}

impl ChatMessage {
    fn now(from: Sender, text: impl Into<String>) -> Self {
        Self {
            from,
            text: Some(text.into()),
            time: chrono::Local::now().format("%H:%M").to_string(),
            recipes: None,
        }
    }
}

fn wants_recipes(text: &str) -> bool {
    let lower = text.to_lowercase();
    RECIPE_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// A conversation persisted in the session store
pub struct ChatSession {
    client: ChatClient,
    store: Arc<dyn SessionStore>,
    session_id: String,
    messages: Vec<ChatMessage>,
}

impl ChatSession {
    /// Resume the stored conversation, or start one with the greeting
    pub fn open(client: ChatClient, store: Arc<dyn SessionStore>) -> ClientResult<Self> {
        let session_id = match store.get(store::CHAT_SESSION_ID)? {
            Some(id) if !id.is_empty() => id,
            _ => {
                let id = uuid::Uuid::new_v4().to_string();
                store.set(store::CHAT_SESSION_ID, &id)?;
                id
            }
        };

        let messages = match store.get(store::CHAT_MESSAGES)? {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("Discarding unreadable chat history: {}", e);
                Vec::new()
            }),
            None => Vec::new(),
        };

        let mut session = Self {
            client,
            store,
            session_id,
            messages,
        };
        if session.messages.is_empty() {
            session.messages.push(ChatMessage::now(Sender::Bot, GREETING));
            session.save()?;
        }
        Ok(session)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    fn save(&self) -> ClientResult<()> {
        let raw =
            serde_json::to_string(&self.messages).map_err(|e| ClientError::Decode(e.to_string()))?;
        self.store.set(store::CHAT_MESSAGES, &raw)?;
        Ok(())
    }

    fn push(&mut self, message: ChatMessage) -> ClientResult<&ChatMessage> {
        self.messages.push(message);
        self.save()?;
        Ok(&self.messages[self.messages.len() - 1])
    }

    /// Every text message so far, as role/content pairs
    pub fn history(&self) -> Vec<HistoryTurn> {
        self.messages
            .iter()
            .filter_map(|m| {
                let text = m.text.as_ref().filter(|t| !t.is_empty())?;
                Some(HistoryTurn {
                    role: match m.from {
                        Sender::User => Role::User,
                        Sender::Bot => Role::Assistant,
                    },
                    content: text.clone(),
                })
            })
            .collect()
    }

    /// Send a user message and append the coach's reply.
    ///
    /// Returns `None` for blank input.
    pub async fn send(&mut self, text: &str) -> ClientResult<Option<&ChatMessage>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        self.push(ChatMessage::now(Sender::User, text))?;

        let reply = if wants_recipes(text) {
            tracing::debug!("Routing message to recipe suggestions");
            self.client.suggest_recipes(text).await.map(|resp| ChatMessage {
                recipes: Some(resp.recipes).filter(|r| !r.is_empty()),
                ..ChatMessage::now(Sender::Bot, resp.intro)
            })
        } else {
            let history = self.history();
            self.client
                .send_message(text, &self.session_id, &history)
                .await
                .map(|resp| {
                    tracing::debug!(provider = %resp.provider, "Chat answer received");
                    ChatMessage::now(Sender::Bot, resp.answer)
                })
        };

        let reply = reply.unwrap_or_else(|e| {
            tracing::error!("Chat request failed: {}", e);
            ChatMessage::now(Sender::Bot, APOLOGY)
        });

        self.push(reply).map(Some)
    }

    /// Ask for recipes built from photos and append them to the conversation
    pub async fn analyze_images(
        &mut self,
        images: Vec<ImageUpload>,
        prompt: Option<&str>,
    ) -> ClientResult<Option<&ChatMessage>> {
        if images.is_empty() {
            return Ok(None);
        }

        let count = images.len();
        let reply = match self.client.analyze_images(images, prompt).await {
            Ok(resp) => ChatMessage {
                recipes: Some(resp.recipes),
                ..ChatMessage::now(
                    Sender::Bot,
                    format!("Recettes générées à partir de {} image(s) :", count),
                )
            },
            Err(e) => {
                tracing::error!("Image analysis failed: {}", e);
                ChatMessage::now(Sender::Bot, IMAGE_ERROR)
            }
        };

        self.push(reply).map(Some)
    }

    /// Drop the history and start over with the greeting
    pub fn clear(&mut self) -> ClientResult<()> {
        self.store.remove(store::CHAT_MESSAGES)?;
        self.messages = vec![ChatMessage::now(Sender::Bot, GREETING)];
        self.save()
    }
}
