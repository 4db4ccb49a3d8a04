//! Generation pipelines.
//!
//! Each use case chains one to three streaming generation calls and reports
//! progress on its task as fragments arrive:
//!
//! - [`script`]: rewrite toward a target character count (draft, adjust,
//!   fine-tune)
//! - [`story`]: write a story of at least N words (draft, optional expansion)
//! - [`plot`]: single-call structured plot outline
//!
//! A pipeline never writes a terminal status itself; it returns an
//! [`Outcome`] (or an error) and the dispatcher finishes the task.

mod phase;
pub mod plot;
pub mod script;
pub mod story;

pub use phase::Phase;

use crate::llm::GenerationClient;
use crate::task::{TaskKind, TaskReporter};

/// A validated request, ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationRequest {
    ScriptRewrite {
        script: String,
        target_chars: usize,
    },
    Story {
        plot_ideas: String,
        min_words: usize,
    },
    Plot {
        prompt: String,
        paragraphs: usize,
        progressions: usize,
    },
}

impl GenerationRequest {
    pub fn kind(&self) -> TaskKind {
        match self {
            GenerationRequest::ScriptRewrite { .. } => TaskKind::ScriptRewrite,
            GenerationRequest::Story { .. } => TaskKind::Story,
            GenerationRequest::Plot { .. } => TaskKind::Plot,
        }
    }
}

/// Final text plus the completion message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub message: String,
    pub text: String,
}

/// Run the pipeline for `request`.
pub async fn run(
    request: &GenerationRequest,
    client: &dyn GenerationClient,
    reporter: &TaskReporter,
) -> anyhow::Result<Outcome> {
    match request {
        GenerationRequest::ScriptRewrite {
            script,
            target_chars,
        } => script::rewrite(client, reporter, script, *target_chars).await,
        GenerationRequest::Story {
            plot_ideas,
            min_words,
        } => story::generate(client, reporter, plot_ideas, *min_words).await,
        GenerationRequest::Plot {
            prompt,
            paragraphs,
            progressions,
        } => plot::generate(client, reporter, prompt, *paragraphs, *progressions).await,
    }
}

/// Length in characters (Unicode scalar values), the unit of every
/// character target in this crate.
pub fn char_count(text: &str) -> usize {
    text.chars().count()
}
