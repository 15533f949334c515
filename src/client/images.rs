//! Image Client
//!
//! Resolves public URLs of stored images and uploads new ones.

use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::Deserialize;

use super::{ApiClient, ClientResult};

pub const LOGO_FILE: &str = "logo-diet-32.jpg";
pub const CHATBOT_FILE: &str = "chatbot1.png";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageResponse {
    pub success: bool,
    pub file_name: Option<String>,
    pub url: Option<String>,
    pub message: Option<String>,
}

/// Client for `<api>/images`
pub struct ImageClient {
    api: ApiClient,
}

impl ImageClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn url_for(&self, file_name: &str) -> ClientResult<ImageResponse> {
        let path = format!("images/url/{}", urlencoding::encode(file_name));
        self.api.send_json(self.api.request(Method::GET, &path)).await
    }

    pub async fn logo_url(&self) -> ClientResult<ImageResponse> {
        self.url_for(LOGO_FILE).await
    }

    pub async fn chatbot_image_url(&self) -> ClientResult<ImageResponse> {
        self.url_for(CHATBOT_FILE).await
    }

    pub async fn upload(&self, bytes: Vec<u8>, file_name: &str) -> ClientResult<ImageResponse> {
        tracing::info!(file = %file_name, size = bytes.len(), "Uploading image");
        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name.to_string()))
            .text("fileName", file_name.to_string());

        let request = self
            .api
            .request(Method::POST, "images/upload")
            .multipart(form);
        self.api.send_json(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::authed_client;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    #[tokio::test]
    async fn test_logo_and_chatbot_urls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/public/images/url/logo-diet-32.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "fileName": "logo-diet-32.jpg",
                "url": "https://cdn.example.com/logo-diet-32.jpg"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/public/images/url/chatbot1.png"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "url": "https://cdn.example.com/chatbot1.png"
            })))
            .mount(&server)
            .await;

        let (api, _) = authed_client(&format!("{}/api/public/", server.uri()));
        let client = ImageClient::new(api);

        let logo = client.logo_url().await.unwrap();
        assert!(logo.success);
        assert_eq!(logo.file_name.as_deref(), Some("logo-diet-32.jpg"));

        let bot = client.chatbot_image_url().await.unwrap();
        assert_eq!(bot.url.as_deref(), Some("https://cdn.example.com/chatbot1.png"));
    }

    #[tokio::test]
    async fn test_upload_multipart_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/public/images/upload"))
            .and(|req: &Request| {
                let body = String::from_utf8_lossy(&req.body);
                body.contains("name=\"file\"; filename=\"tajine.jpg\"")
                    && body.contains("name=\"fileName\"")
            })
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "fileName": "tajine.jpg",
                "message": "Image uploaded"
            })))
            .mount(&server)
            .await;

        let (api, _) = authed_client(&format!("{}/api/public/", server.uri()));
        let response = ImageClient::new(api)
            .upload(vec![1, 2, 3], "tajine.jpg")
            .await
            .unwrap();
        assert_eq!(response.message.as_deref(), Some("Image uploaded"));
    }
}
