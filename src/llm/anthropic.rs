//! Anthropic Messages API client with SSE streaming.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::sse::{SseDecoder, SseEvent};
use super::{ChatMessage, FragmentStream, GenerationClient, LlmError};
use crate::config::GenerationConfig;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Streaming client for the Anthropic Messages API. No retries: a failed
/// call fails the task that issued it.
#[derive(Clone)]
pub struct AnthropicClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn new(config: &GenerationConfig) -> Self {
        let mut base_url = config.base_url.clone();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: Client::new(),
            endpoint: format!("{}/v1/messages", base_url),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Parse Retry-After header if present.
    fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
        headers
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
    }
}

#[async_trait]
impl GenerationClient for AnthropicClient {
    async fn stream(&self, prompt: &str) -> Result<FragmentStream, LlmError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            stream: true,
            messages: vec![ChatMessage::user(prompt)],
        };

        tracing::debug!(
            model = %self.model,
            prompt_chars = prompt.chars().count(),
            "Sending streaming request to Anthropic"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Accept", "text/event-stream")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = Self::parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            let err = LlmError::from_status(status.as_u16(), &body, retry_after);
            tracing::error!("Generation request failed: {}", err);
            return Err(err);
        }

        let mut bytes = response.bytes_stream();
        let fragments = async_stream::try_stream! {
            let mut decoder = SseDecoder::new();
            'read: while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(|e| LlmError::network_error(format!("Stream interrupted: {}", e)))?;
                for event in decoder.push(&chunk) {
                    match interpret_event(&event)? {
                        StreamStep::Text(text) => yield text,
                        StreamStep::Skip => {}
                        StreamStep::Stop => break 'read,
                    }
                }
            }
        };

        Ok(fragments.boxed())
    }
}

/// What a single SSE event means for the fragment stream.
#[derive(Debug, PartialEq, Eq)]
enum StreamStep {
    Text(String),
    Skip,
    Stop,
}

fn interpret_event(event: &SseEvent) -> Result<StreamStep, LlmError> {
    // Anthropic always sends a `type` in the data payload; the `event:` line
    // mirrors it, so the payload is authoritative.
    if event.data.is_empty() {
        return Ok(StreamStep::Skip);
    }
    let payload: StreamPayload = serde_json::from_str(&event.data).map_err(|e| {
        LlmError::parse_error(format!("Failed to parse stream event: {}, data: {}", e, event.data))
    })?;

    match payload {
        StreamPayload::ContentBlockDelta {
            delta: Delta::TextDelta { text },
        } => Ok(StreamStep::Text(text)),
        StreamPayload::MessageStop => Ok(StreamStep::Stop),
        StreamPayload::Error { error } => Err(LlmError::stream_error(format!(
            "{}: {}",
            error.error_type, error.message
        ))),
        _ => Ok(StreamStep::Skip),
    }
}

/// Messages API request body.
#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    stream: bool,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamPayload {
    ContentBlockDelta {
        delta: Delta,
    },
    MessageStop,
    Error {
        error: ProviderError,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmErrorKind;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> GenerationConfig {
        GenerationConfig {
            api_key: "test-key".to_string(),
            base_url: format!("{}/", server.uri()),
            model: "claude-test".to_string(),
            max_tokens: 64000,
        }
    }

    fn sse_body(fragments: &[&str]) -> String {
        let mut body = String::from(
            "event: message_start\ndata: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\"}}\n\n",
        );
        body.push_str("event: content_block_start\ndata: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n");
        for fragment in fragments {
            let data = serde_json::json!({
                "type": "content_block_delta",
                "index": 0,
                "delta": {"type": "text_delta", "text": fragment}
            });
            body.push_str(&format!("event: content_block_delta\ndata: {}\n\n", data));
        }
        body.push_str("event: ping\ndata: {\"type\":\"ping\"}\n\n");
        body.push_str("event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n");
        body
    }

    #[tokio::test]
    async fn test_streams_text_deltas() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "claude-test",
                "max_tokens": 64000,
                "stream": true,
                "messages": [{"role": "user", "content": "Write a story"}]
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse_body(&["Hello", ", ", "world"])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = AnthropicClient::new(&config_for(&server));
        let mut updates = 0;
        let text = client
            .generate_streaming("Write a story", &mut |_| updates += 1)
            .await
            .unwrap();

        assert_eq!(text, "Hello, world");
        assert_eq!(updates, 3);
    }

    #[tokio::test]
    async fn test_http_error_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid x-api-key"))
            .mount(&server)
            .await;

        let client = AnthropicClient::new(&config_for(&server));
        let err = client.generate("hi").await.unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::ClientError);
        assert_eq!(err.status_code, Some(401));
    }

    #[tokio::test]
    async fn test_error_event_fails_the_call() {
        let server = MockServer::start().await;
        let body = "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"par\"}}\n\n\
                    event: error\ndata: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\n\n";
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let client = AnthropicClient::new(&config_for(&server));
        let err = client.generate("hi").await.unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::StreamError);
        assert_eq!(err.message, "overloaded_error: Overloaded");
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Bind then release a port so nothing is listening on it.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let client = AnthropicClient::new(&GenerationConfig {
            api_key: "test-key".to_string(),
            base_url: format!("http://127.0.0.1:{}", port),
            model: "claude-test".to_string(),
            max_tokens: 64,
        });

        let err = client.generate("hi").await.unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::NetworkError);
    }

    #[test]
    fn test_interpret_ignores_non_text_deltas() {
        let event = SseEvent {
            event: Some("content_block_delta".to_string()),
            data: r#"{"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"{"}}"#.to_string(),
        };
        assert_eq!(interpret_event(&event).unwrap(), StreamStep::Skip);
    }
}
