//! OpenAI-compatible chat completion client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::CompletionError;
use crate::models::CompletionConfig;

/// Turns a prompt into generated text.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;

    fn model(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for `{base_url}/chat/completions`.
#[derive(Debug, Clone)]
pub struct CompletionClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: Option<f32>,
}

impl CompletionClient {
    pub fn new(config: &CompletionConfig, api_key: String) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.effective_temperature(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ChatCompletion for CompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status { status, body });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::InvalidResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| CompletionError::InvalidResponse("response has no choices".to_string()))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> CompletionClient {
        let config = CompletionConfig {
            base_url: format!("{}/v1/", server.uri()),
            ..Default::default()
        };
        CompletionClient::new(&config, "gsk_test".to_string()).unwrap()
    }

    #[test]
    fn test_base_url_trimming() {
        let config = CompletionConfig {
            base_url: "https://api.example.com/v1/".to_string(),
            ..Default::default()
        };
        let client = CompletionClient::new(&config, "key".to_string()).unwrap();
        assert_eq!(client.base_url(), "https://api.example.com/v1");
        assert_eq!(client.model(), "llama-3.1-8b-instant");
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice_trimmed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer gsk_test"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama-3.1-8b-instant",
                "temperature": 0.2,
                "messages": [{"role": "user", "content": "Say hi"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [
                    {"message": {"role": "assistant", "content": "  Hi!\n"}},
                    {"message": {"role": "assistant", "content": "ignored"}}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let answer = client_for(&server).complete("Say hi").await.unwrap();
        assert_eq!(answer, "Hi!");
    }

    #[tokio::test]
    async fn test_provider_temperature_is_omitted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(|request: &wiremock::Request| {
                serde_json::from_slice::<serde_json::Value>(&request.body)
                    .map(|body| body.get("temperature").is_none())
                    .unwrap_or(false)
            })
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "Hi!"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = CompletionConfig {
            base_url: format!("{}/v1", server.uri()),
            use_provider_temperature: true,
            ..Default::default()
        };
        let client = CompletionClient::new(&config, "gsk_test".to_string()).unwrap();
        assert_eq!(client.complete("Say hi").await.unwrap(), "Hi!");
    }

    #[tokio::test]
    async fn test_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let err = client_for(&server).complete("Say hi").await.unwrap_err();
        assert!(matches!(err, CompletionError::Status { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_no_choices_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
            .mount(&server)
            .await;

        let err = client_for(&server).complete("Say hi").await.unwrap_err();
        assert!(matches!(err, CompletionError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let config = CompletionConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..Default::default()
        };
        let client = CompletionClient::new(&config, "key".to_string()).unwrap();
        assert!(matches!(
            client.complete("Say hi").await,
            Err(CompletionError::Transport(_))
        ));
    }
}
