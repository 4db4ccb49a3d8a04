//! Raw submissions and their validation into pipeline requests.

use crate::docx;
use crate::pipeline::GenerationRequest;

use super::task::TaskKind;
use super::TaskError;

/// Where the source text comes from.
#[derive(Debug, Clone)]
pub enum SourceInput {
    Text(String),
    /// An uploaded file; only `.docx` is accepted.
    Upload { filename: String, bytes: Vec<u8> },
}

/// Numeric fields exactly as they arrived in the form.
#[derive(Debug, Clone, Default)]
pub struct RawConstraints {
    pub target_char_count: Option<String>,
    pub min_word_count: Option<String>,
    pub paragraph_count: Option<String>,
    pub progressions_per_paragraph: Option<String>,
}

/// A request as received, before any validation.
#[derive(Debug, Clone)]
pub struct Submission {
    pub kind: TaskKind,
    pub source: SourceInput,
    pub constraints: RawConstraints,
}

impl Submission {
    /// Resolve the source text and parse constraints. Fails before any task
    /// exists, so a rejected submission leaves no trace in the store.
    pub fn validate(self) -> Result<GenerationRequest, TaskError> {
        let text = resolve_text(self.source)?;
        if text.is_empty() {
            return Err(invalid(match self.kind {
                TaskKind::ScriptRewrite => "No script text provided",
                TaskKind::Story => "No plot ideas provided",
                TaskKind::Plot => "No plot prompt provided",
            }));
        }

        let c = &self.constraints;
        let request = match self.kind {
            TaskKind::ScriptRewrite => GenerationRequest::ScriptRewrite {
                script: text,
                target_chars: positive(&c.target_char_count, "Invalid character count")?,
            },
            TaskKind::Story => GenerationRequest::Story {
                plot_ideas: text,
                min_words: positive(&c.min_word_count, "Invalid word count")?,
            },
            TaskKind::Plot => GenerationRequest::Plot {
                prompt: text,
                paragraphs: positive(&c.paragraph_count, "Invalid paragraph count")?,
                progressions: positive(
                    &c.progressions_per_paragraph,
                    "Invalid progressions per paragraph",
                )?,
            },
        };
        Ok(request)
    }
}

fn resolve_text(source: SourceInput) -> Result<String, TaskError> {
    match source {
        SourceInput::Text(text) => Ok(text.trim().to_string()),
        SourceInput::Upload { filename, bytes } => {
            if !filename.to_ascii_lowercase().ends_with(".docx") {
                return Err(invalid("Invalid file format. Please upload a DOCX file."));
            }
            let text = docx::extract_text(&bytes).map_err(|e| {
                tracing::debug!(%filename, "Rejected upload: {}", e);
                match e {
                    docx::DocxError::TooLarge { .. } => {
                        invalid("The uploaded DOCX file is too large.")
                    }
                    _ => invalid("Could not read the uploaded DOCX file."),
                }
            })?;
            Ok(text.trim().to_string())
        }
    }
}

/// Digits only, parsed, strictly positive.
fn positive(raw: &Option<String>, message: &str) -> Result<usize, TaskError> {
    let value = raw.as_deref().unwrap_or("").trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(message));
    }
    match value.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(invalid(message)),
    }
}

fn invalid(message: &str) -> TaskError {
    TaskError::InvalidInput(message.to_string())
}
