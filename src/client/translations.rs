//! Translation Client
//!
//! UI strings per language and namespace, cached per `lang_ns`. Every
//! read degrades gracefully: the built-in language list, an empty
//! namespace or the key itself stand in when the backend is down.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{watch, RwLock};

use super::{ApiClient, ClientResult};

pub const DEFAULT_LANGUAGE: &str = "fr";
pub const DEFAULT_NAMESPACE: &str = "common";

const READ_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Language {
    pub id: u32,
    pub code: String,
    pub name: String,
    pub native_name: String,
    pub active: bool,
    pub sort_order: u32,
}

/// Languages offered when the backend cannot list them
pub fn builtin_languages() -> Vec<Language> {
    [
        (1, "fr", "Français"),
        (2, "en", "English"),
        (3, "es", "Español"),
        (4, "ar", "العربية"),
    ]
    .into_iter()
    .map(|(id, code, name)| Language {
        id,
        code: code.to_string(),
        name: name.to_string(),
        native_name: name.to_string(),
        active: true,
        sort_order: id,
    })
    .collect()
}

fn cache_key(lang: &str, namespace: &str) -> String {
    format!("{}_{}", lang, namespace)
}

/// Client for `<api-root>/v1/translations`
pub struct TranslationClient {
    api: ApiClient,
    cache: RwLock<HashMap<String, HashMap<String, String>>>,
    backend_available: AtomicBool,
    language_tx: watch::Sender<String>,
}

impl TranslationClient {
    pub fn new(api: ApiClient) -> Self {
        let (language_tx, _) = watch::channel(DEFAULT_LANGUAGE.to_string());
        Self {
            api,
            cache: RwLock::new(HashMap::new()),
            backend_available: AtomicBool::new(false),
            language_tx,
        }
    }

    pub async fn languages(&self) -> Vec<Language> {
        let request = self
            .api
            .request(Method::GET, "languages")
            .timeout(READ_TIMEOUT);

        match self.api.send_json::<Vec<Language>>(request).await {
            Ok(languages) => {
                tracing::info!(count = languages.len(), "Languages loaded from backend");
                self.backend_available.store(true, Ordering::Relaxed);
                languages
            }
            Err(e) => {
                tracing::warn!("Languages unavailable, using built-in list: {}", e);
                self.backend_available.store(false, Ordering::Relaxed);
                builtin_languages()
            }
        }
    }

    /// Whether the last language listing reached the backend
    pub fn is_backend_available(&self) -> bool {
        self.backend_available.load(Ordering::Relaxed)
    }

    /// All keys of a namespace; empty when the backend fails
    pub async fn namespace(&self, lang: &str, namespace: &str) -> HashMap<String, String> {
        let key = cache_key(lang, namespace);
        if let Some(hit) = self.cache.read().await.get(&key) {
            tracing::debug!(cache_key = %key, "Translation cache hit");
            return hit.clone();
        }

        let path = format!(
            "{}/{}",
            urlencoding::encode(lang),
            urlencoding::encode(namespace)
        );
        let request = self.api.request(Method::GET, &path).timeout(READ_TIMEOUT);

        match self.api.send_json::<HashMap<String, String>>(request).await {
            Ok(translations) => {
                tracing::debug!(
                    namespace = %namespace,
                    keys = translations.len(),
                    "Namespace loaded"
                );
                self.cache.write().await.insert(key, translations.clone());
                translations
            }
            Err(e) => {
                tracing::warn!(namespace = %namespace, "Could not load namespace: {}", e);
                HashMap::new()
            }
        }
    }

    /// One translated string, or the key itself
    pub async fn translation(&self, lang: &str, key: &str) -> String {
        let request = self
            .api
            .request(Method::GET, &urlencoding::encode(lang))
            .query(&[("key", key)])
            .timeout(READ_TIMEOUT);

        let body = match self.api.execute(request).await {
            Ok(response) => response.text().await.ok(),
            Err(e) => {
                tracing::warn!(key = %key, "Could not load translation: {}", e);
                None
            }
        };

        match body {
            // Either a JSON string or the bare value
            Some(text) if !text.is_empty() => {
                serde_json::from_str::<String>(&text).unwrap_or(text)
            }
            _ => key.to_string(),
        }
    }

    /// Store a translation and drop the cached namespace it belongs to
    pub async fn save(
        &self,
        lang: &str,
        key: &str,
        value: &str,
        namespace: &str,
    ) -> ClientResult<()> {
        tracing::info!(lang = %lang, key = %key, "Saving translation");
        let request = self
            .api
            .request(Method::POST, &urlencoding::encode(lang))
            .query(&[("key", key), ("value", value), ("namespace", namespace)])
            .timeout(READ_TIMEOUT);

        self.api.send_empty(request).await?;
        self.cache.write().await.remove(&cache_key(lang, namespace));
        Ok(())
    }

    pub async fn clear_cache(&self) {
        self.cache.write().await.clear();
    }

    pub fn current_language(&self) -> String {
        self.language_tx.borrow().clone()
    }

    pub fn set_current_language(&self, lang: &str) {
        tracing::info!(lang = %lang, "Switching language");
        self.language_tx.send_replace(lang.to_string());
    }

    /// Receive every language switch
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.language_tx.subscribe()
    }
}
