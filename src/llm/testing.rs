//! Fake generation clients for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use tokio::sync::Semaphore;

use super::{FragmentStream, GenerationClient, LlmError};

/// Fragment size used when replaying a scripted response.
const FRAGMENT_CHARS: usize = 97;

fn fragments_of(text: &str) -> Vec<Result<String, LlmError>> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(FRAGMENT_CHARS)
        .map(|c| Ok(c.iter().collect()))
        .collect()
}

/// Replays queued responses in order and records every prompt it receives.
#[derive(Default)]
pub(crate) struct ScriptedClient {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, text: impl Into<String>) -> Self {
        self.responses.lock().unwrap().push_back(Ok(text.into()));
        self
    }

    pub fn fail(self, error: LlmError) -> Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn stream(&self, prompt: &str) -> Result<FragmentStream, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let next = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::stream_error("no scripted response left")));
        let text = next?;
        Ok(stream::iter(fragments_of(&text)).boxed())
    }
}

/// Blocks every call until [`GatedClient::open`] is called.
pub(crate) struct GatedClient {
    gate: Semaphore,
    text: String,
}

impl GatedClient {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            gate: Semaphore::new(0),
            text: text.into(),
        }
    }

    pub fn open(&self) {
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }
}

#[async_trait]
impl GenerationClient for GatedClient {
    async fn stream(&self, _prompt: &str) -> Result<FragmentStream, LlmError> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| LlmError::stream_error(e.to_string()))?;
        Ok(stream::iter(fragments_of(&self.text)).boxed())
    }
}

/// Panics on every call.
pub(crate) struct PanickingClient;

#[async_trait]
impl GenerationClient for PanickingClient {
    async fn stream(&self, _prompt: &str) -> Result<FragmentStream, LlmError> {
        panic!("generation backend blew up");
    }
}
