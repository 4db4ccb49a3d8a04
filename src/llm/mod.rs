//! LLM client module for the text-generation service.
//!
//! This module provides a trait-based abstraction over streaming providers,
//! with the Anthropic Messages API as the primary implementation.
//!
//! A call produces a lazy, finite [`FragmentStream`]: an ordered sequence of
//! text pieces whose sizes are chosen by the provider. Callers that only want
//! the final text use [`GenerationClient::generate`]; callers that report
//! progress use [`GenerationClient::generate_streaming`].

mod anthropic;
mod error;
mod sse;
#[cfg(test)]
pub(crate) mod testing;

pub use anthropic::AnthropicClient;
pub use error::{classify_http_status, LlmError, LlmErrorKind};
pub use sse::{SseDecoder, SseEvent};

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

/// Role in a chat conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
}

/// A message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Ordered text fragments of one response. Ends when the provider closes
/// the stream; an `Err` item ends it early.
pub type FragmentStream = BoxStream<'static, Result<String, LlmError>>;

/// Trait for streaming text-generation clients.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Issue one request carrying `prompt` as the single user message.
    async fn stream(&self, prompt: &str) -> Result<FragmentStream, LlmError>;

    /// Generate text, calling `on_chunk` with the accumulated text after
    /// every fragment.
    async fn generate_streaming(
        &self,
        prompt: &str,
        on_chunk: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<String, LlmError> {
        let mut fragments = self.stream(prompt).await?;
        let mut text = String::new();
        while let Some(fragment) = fragments.next().await {
            text.push_str(&fragment?);
            on_chunk(&text);
        }
        Ok(text)
    }

    /// Generate text without progress reporting.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.generate_streaming(prompt, &mut |_| {}).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    struct FixedClient(Vec<Result<String, LlmError>>);

    #[async_trait]
    impl GenerationClient for FixedClient {
        async fn stream(&self, _prompt: &str) -> Result<FragmentStream, LlmError> {
            Ok(stream::iter(self.0.clone()).boxed())
        }
    }

    #[tokio::test]
    async fn test_generate_streaming_reports_accumulated_text() {
        let client = FixedClient(vec![
            Ok("Once ".to_string()),
            Ok("upon".to_string()),
            Ok(" a time".to_string()),
        ]);

        let mut seen = Vec::new();
        let text = client
            .generate_streaming("prompt", &mut |acc| seen.push(acc.to_string()))
            .await
            .unwrap();

        assert_eq!(text, "Once upon a time");
        assert_eq!(seen, vec!["Once ", "Once upon", "Once upon a time"]);
    }

    #[tokio::test]
    async fn test_generate_fails_on_fragment_error() {
        let client = FixedClient(vec![
            Ok("partial".to_string()),
            Err(LlmError::stream_error("overloaded_error: Overloaded")),
        ]);

        let err = client.generate("prompt").await.unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::StreamError);
        assert!(err.to_string().contains("Overloaded"));
    }
}
