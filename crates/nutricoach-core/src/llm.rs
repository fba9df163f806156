//! Language-model client.
//!
//! [`LanguageModel`] is the seam the orchestrator talks to; the production
//! implementation is [`AnthropicClient`], a thin wrapper over the
//! Anthropic Messages API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// The only Sonnet version requests are sent to.
pub const PINNED_SONNET_MODEL: &str = "claude-sonnet-4-20250514";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("language model API key not configured")]
    MissingApiKey,

    #[error("request to language model failed: {0}")]
    Request(String),

    #[error("language model API error: {0}")]
    Api(String),

    #[error("could not parse language model response: {0}")]
    Parse(String),

    #[error("language model response missing text content")]
    MissingTextContent,
}

/// One single-turn completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub prompt: String,
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// The text of the first content block plus provider metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: Usage,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError>;
}

/// Rewrite any Sonnet alias to the pinned Sonnet version; other names pass
/// through unchanged.
pub fn normalize_model_name(model: &str) -> String {
    if model.to_lowercase().contains("sonnet") {
        PINNED_SONNET_MODEL.to_owned()
    } else {
        model.to_owned()
    }
}

// ---------------------------------------------------------------------------
// Anthropic Messages API
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

pub struct AnthropicClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicClient {
    /// Build a client. An empty key is rejected up front so the failure
    /// shows before any plan work starts.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }
        Ok(Self {
            client: Client::new(),
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        })
    }

    /// Build a client from `ANTHROPIC_API_KEY` and, if set,
    /// `ANTHROPIC_BASE_URL`.
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| LlmError::MissingApiKey)?;
        let base_url =
            std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
        Self::new(api_key, base_url)
    }
}

#[async_trait]
impl LanguageModel for AnthropicClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = MessagesRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: [Message {
                role: "user",
                content: &request.prompt,
            }],
        };

        debug!(model = %request.model, max_tokens = request.max_tokens, "sending completion request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<ErrorResponse>(&text) {
                return Err(LlmError::Api(err.error.message));
            }
            return Err(LlmError::Api(format!("HTTP {status}: {text}")));
        }

        let parsed: MessagesResponse =
            serde_json::from_str(&text).map_err(|e| LlmError::Parse(e.to_string()))?;

        let first = parsed.content.into_iter().next();
        let text = match first {
            Some(ContentBlock { kind, text: Some(t) }) if kind == "text" => t,
            _ => return Err(LlmError::MissingTextContent),
        };

        debug!(
            input_tokens = parsed.usage.input_tokens,
            output_tokens = parsed.usage.output_tokens,
            "completion received"
        );

        Ok(Completion {
            text,
            usage: parsed.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: PINNED_SONNET_MODEL.into(),
            max_tokens: 4000,
            temperature: 0.3,
            prompt: "Olá".into(),
        }
    }

    #[test]
    fn sonnet_aliases_are_pinned() {
        assert_eq!(normalize_model_name("claude-3-5-sonnet-latest"), PINNED_SONNET_MODEL);
        assert_eq!(normalize_model_name("Claude-Sonnet"), PINNED_SONNET_MODEL);
        assert_eq!(normalize_model_name("claude-3-haiku-20240307"), "claude-3-haiku-20240307");
    }

    #[test]
    fn empty_key_is_missing() {
        assert!(matches!(
            AnthropicClient::new("  ", DEFAULT_BASE_URL),
            Err(LlmError::MissingApiKey)
        ));
    }

    #[tokio::test]
    async fn returns_first_text_block() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "test-key")
            .match_header("anthropic-version", API_VERSION)
            .match_body(Matcher::PartialJson(serde_json::json!({
                "model": PINNED_SONNET_MODEL,
                "max_tokens": 4000,
                "messages": [{ "role": "user", "content": "Olá" }]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "content": [{ "type": "text", "text": "{\"summary\":\"ok\"}" }],
                    "usage": { "input_tokens": 12, "output_tokens": 5 }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = AnthropicClient::new("test-key", server.url()).unwrap();
        let completion = client.complete(&request()).await.unwrap();

        assert_eq!(completion.text, "{\"summary\":\"ok\"}");
        assert_eq!(completion.usage.output_tokens, 5);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_text_first_block_is_missing_text() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_body(r#"{"content":[{"type":"tool_use","id":"x"}]}"#)
            .create_async()
            .await;

        let client = AnthropicClient::new("k", server.url()).unwrap();
        let err = client.complete(&request()).await.unwrap_err();
        assert!(matches!(err, LlmError::MissingTextContent));
    }

    #[tokio::test]
    async fn api_error_message_is_surfaced() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/messages")
            .with_status(529)
            .with_body(r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#)
            .create_async()
            .await;

        let client = AnthropicClient::new("k", server.url()).unwrap();
        match client.complete(&request()).await {
            Err(LlmError::Api(msg)) => assert_eq!(msg, "Overloaded"),
            other => panic!("expected Api error, got {other:?}"),
        }
    }
}
