//! Export a completed task's result as a `.docx` file.

use chrono::{DateTime, Utc};

use crate::docx::{Block, Document, DocxError};
use crate::pipeline::story::{story_title, strip_story_header};
use crate::task::{TaskId, TaskKind, TaskStatus, TaskStore};

const PLOT_TITLE: &str = "Generated Plot Structure";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Unknown id, or the task has not completed.
    #[error("Task not completed or not found")]
    TaskNotReady,
    #[error(transparent)]
    Docx(#[from] DocxError),
}

#[derive(Debug, Clone)]
pub struct ExportedDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
}

pub fn export(store: &dyn TaskStore, id: &TaskId) -> Result<ExportedDocument, ExportError> {
    let task = store.get(id).ok_or(ExportError::TaskNotReady)?;
    let result = match (task.status(), task.result()) {
        (TaskStatus::Completed, Some(result)) => result,
        _ => return Err(ExportError::TaskNotReady),
    };

    let document = layout(task.kind(), result);
    let bytes = document.to_bytes()?;
    tracing::debug!(task_id = %id, bytes = bytes.len(), "Exported task result");

    Ok(ExportedDocument {
        filename: filename(task.kind(), Utc::now()),
        bytes,
    })
}

/// Arrange result text into document blocks for `kind`.
pub fn layout(kind: TaskKind, text: &str) -> Document {
    let mut doc = Document::default();
    match kind {
        TaskKind::ScriptRewrite => push_lines(&mut doc, text),
        TaskKind::Story => {
            if let Some(title) = story_title(text) {
                doc.push(Block::heading(0, title));
            }
            push_lines(&mut doc, &strip_story_header(text));
        }
        TaskKind::Plot => {
            doc.push(Block::heading(0, PLOT_TITLE));
            for line in non_blank_lines(text) {
                match bold_header(line) {
                    Some(header) => doc.push(Block::heading(2, header)),
                    None => doc.push(Block::paragraph(line)),
                }
            }
        }
    }
    doc
}

fn filename(kind: TaskKind, at: DateTime<Utc>) -> String {
    let prefix = match kind {
        TaskKind::ScriptRewrite => "rewritten_script",
        TaskKind::Story => "generated_story",
        TaskKind::Plot => "generated_plot",
    };
    format!("{}_{}.docx", prefix, at.format("%Y%m%d_%H%M%S"))
}

fn push_lines(doc: &mut Document, text: &str) {
    for line in non_blank_lines(text) {
        doc.push(Block::paragraph(line));
    }
}

fn non_blank_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n').filter(|line| !line.trim().is_empty())
}

/// `**Heading**` on its own line, markers stripped.
fn bold_header(line: &str) -> Option<String> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix("**")?.strip_suffix("**")?;
    let inner = inner.trim();
    (!inner.is_empty()).then(|| inner.replace('*', ""))
}
