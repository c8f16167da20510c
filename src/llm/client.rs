//! HTTP completion backend for OpenAI-compatible chat APIs

use super::{CompletionBackend, CompletionRequest, CompletionResponse};
use crate::config::LlmConfig;
use crate::error::{Result, SummarizeError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Backend that posts chat completions over HTTP
pub struct HttpCompletionBackend {
    http: Client,
    config: LlmConfig,
}

impl HttpCompletionBackend {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| SummarizeError::Configuration(e.to_string()))?;

        Ok(Self { http, config })
    }
}

#[async_trait]
impl CompletionBackend for HttpCompletionBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        debug!(
            "completion call: model={}, max_tokens={}, prompt_len={}",
            request.model,
            request.max_tokens,
            request.user_prompt.len()
        );

        let body = ChatCompletionRequest {
            model: request.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system_prompt,
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.user_prompt,
                },
            ],
            max_tokens: Some(request.max_tokens),
            temperature: Some(request.temperature),
        };

        let mut req = self.http.post(&self.config.endpoint).json(&body);
        if let Some(ref api_key) = self.config.api_key {
            req = req.bearer_auth(api_key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| SummarizeError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let message = response.text().await.unwrap_or_default();

            return Err(classify_status(status.as_u16(), message, retry_after));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| SummarizeError::InvalidResponse(e.to_string()))?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| SummarizeError::InvalidResponse("no choices in response".to_string()))?;

        Ok(CompletionResponse {
            text: choice.message.content,
            model: completion.model.unwrap_or(request.model),
        })
    }
}

/// Map an upstream status code onto the retry taxonomy: 429 is rate-limited,
/// 503/529 overloaded, anything else terminal.
fn classify_status(status: u16, message: String, retry_after: Option<u64>) -> SummarizeError {
    match status {
        429 => SummarizeError::RateLimited { retry_after },
        503 | 529 => SummarizeError::Overloaded(message),
        _ => SummarizeError::Upstream { status, message },
    }
}

/// Parse a Retry-After header as integer seconds or an HTTP-date.
fn parse_retry_after(value: &str) -> Option<u64> {
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(seconds);
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value) {
        let delta = date.signed_duration_since(chrono::Utc::now());
        return Some(delta.num_seconds().max(0) as u64);
    }

    None
}

// OpenAI-compatible wire types
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_request() -> CompletionRequest {
        CompletionRequest {
            system_prompt: "You are a concise summarizer.".to_string(),
            user_prompt: "Summarize: hello world".to_string(),
            model: "test-model".to_string(),
            max_tokens: 128,
            temperature: 0.3,
        }
    }

    fn backend_for(server: &mockito::ServerGuard) -> HttpCompletionBackend {
        let config = LlmConfig {
            endpoint: format!("{}/v1/chat/completions", server.url()),
            ..LlmConfig::default()
        };
        HttpCompletionBackend::new(config).unwrap()
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(429, String::new(), Some(10)),
            SummarizeError::RateLimited {
                retry_after: Some(10)
            }
        ));
        assert!(matches!(
            classify_status(503, "busy".to_string(), None),
            SummarizeError::Overloaded(_)
        ));
        assert!(matches!(
            classify_status(529, "overloaded".to_string(), None),
            SummarizeError::Overloaded(_)
        ));
        assert!(matches!(
            classify_status(400, "bad".to_string(), None),
            SummarizeError::Upstream { status: 400, .. }
        ));
        assert!(matches!(
            classify_status(401, "auth".to_string(), None),
            SummarizeError::Upstream { status: 401, .. }
        ));
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        assert_eq!(parse_retry_after("30"), Some(30));
        assert_eq!(parse_retry_after("0"), Some(0));
        assert_eq!(parse_retry_after("not-a-number"), None);
    }

    #[test]
    fn test_parse_retry_after_http_date() {
        let future = (chrono::Utc::now() + chrono::Duration::seconds(120)).to_rfc2822();
        let parsed = parse_retry_after(&future).unwrap();
        assert!(parsed > 0 && parsed <= 120);

        let past = (chrono::Utc::now() - chrono::Duration::seconds(120)).to_rfc2822();
        assert_eq!(parse_retry_after(&past), Some(0));
    }

    #[tokio::test]
    async fn test_successful_completion() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"model":"test-model-0613","choices":[{"message":{"role":"assistant","content":"a summary"}}]}"#,
            )
            .create_async()
            .await;

        let backend = backend_for(&server);
        let response = backend.complete(test_request()).await.unwrap();
        assert_eq!(response.text, "a summary");
        assert_eq!(response.model, "test-model-0613");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limited_with_retry_after() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(429)
            .with_header("retry-after", "7")
            .with_body(r#"{"error":{"message":"rate limited"}}"#)
            .create_async()
            .await;

        let backend = backend_for(&server);
        let err = backend.complete(test_request()).await.unwrap_err();
        assert!(matches!(
            err,
            SummarizeError::RateLimited {
                retry_after: Some(7)
            }
        ));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_overloaded_is_transient() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(529)
            .with_body(r#"{"error":{"type":"overloaded_error","message":"Overloaded"}}"#)
            .create_async()
            .await;

        let backend = backend_for(&server);
        let err = backend.complete(test_request()).await.unwrap_err();
        assert!(matches!(err, SummarizeError::Overloaded(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_bad_request_is_terminal() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(400)
            .with_body(r#"{"error":{"message":"invalid request"}}"#)
            .create_async()
            .await;

        let backend = backend_for(&server);
        let err = backend.complete(test_request()).await.unwrap_err();
        assert!(matches!(err, SummarizeError::Upstream { status: 400, .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_empty_choices_is_invalid_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"model":"m","choices":[]}"#)
            .create_async()
            .await;

        let backend = backend_for(&server);
        let err = backend.complete(test_request()).await.unwrap_err();
        assert!(matches!(err, SummarizeError::InvalidResponse(_)));
    }
}
