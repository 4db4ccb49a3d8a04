//! Task endpoints: submit, poll, stream, export.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Multipart, Path, State},
    http::header,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::stream::Stream;

use super::error::ApiError;
use super::routes::AppState;
use super::types::SubmitResponse;
use crate::docx::DOCX_CONTENT_TYPE;
use crate::export;
use crate::task::{RawConstraints, SourceInput, Submission, Task, TaskError, TaskId, TaskKind};

const STREAM_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Form fields of a submission, before validation.
#[derive(Debug, Default)]
struct SubmissionForm {
    kind: Option<String>,
    text: Option<String>,
    upload: Option<(String, Vec<u8>)>,
    constraints: RawConstraints,
}

impl SubmissionForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = SubmissionForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(e.to_string()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" | "script_file" | "plot_file" | "prompt_file" => {
                    let filename = field.file_name().unwrap_or_default().to_string();
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::bad_request(e.to_string()))?;
                    // Browsers send an empty part when no file was chosen.
                    if !filename.is_empty() {
                        form.upload = Some((filename, bytes.to_vec()));
                    }
                }
                _ => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| ApiError::bad_request(e.to_string()))?;
                    form.set_text_field(&name, value);
                }
            }
        }
        Ok(form)
    }

    fn set_text_field(&mut self, name: &str, value: String) {
        let c = &mut self.constraints;
        match name {
            "kind" => self.kind = Some(value),
            "text" | "script_text" | "plot_ideas" | "plot_prompt" => self.text = Some(value),
            "target_char_count" => c.target_char_count = Some(value),
            "min_word_count" => c.min_word_count = Some(value),
            "paragraph_count" => c.paragraph_count = Some(value),
            "progressions_per_paragraph" => c.progressions_per_paragraph = Some(value),
            other => tracing::debug!(field = other, "Ignoring unknown form field"),
        }
    }

    fn into_submission(self) -> Result<Submission, ApiError> {
        let kind: TaskKind = self
            .kind
            .as_deref()
            .ok_or_else(|| ApiError::bad_request("Missing task kind"))?
            .parse()
            .map_err(ApiError::bad_request)?;

        let source = match self.upload {
            Some((filename, bytes)) => SourceInput::Upload { filename, bytes },
            None => SourceInput::Text(self.text.unwrap_or_default()),
        };

        Ok(Submission {
            kind,
            source,
            constraints: self.constraints,
        })
    }
}

fn parse_id(raw: &str) -> Result<TaskId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::from(TaskError::NotFound))
}

/// `POST /api/tasks`
pub async fn submit(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<SubmitResponse>, ApiError> {
    let submission = SubmissionForm::read(multipart).await?.into_submission()?;
    // Validation may decompress an uploaded DOCX; keep it off the async workers.
    let dispatcher = state.dispatcher.clone();
    let task_id = tokio::task::spawn_blocking(move || dispatcher.submit(submission))
        .await
        .map_err(|e| ApiError::internal(e.to_string()))??;
    Ok(Json(SubmitResponse {
        status: "processing".to_string(),
        task_id,
    }))
}

/// `GET /api/tasks/:id`
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    let id = parse_id(&id)?;
    state
        .store
        .get(&id)
        .map(Json)
        .ok_or_else(|| TaskError::NotFound.into())
}

/// `GET /api/tasks/:id/stream`
///
/// Emits a `progress` event whenever the record changes and a final `done`
/// event carrying the terminal record.
pub async fn stream_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let id = parse_id(&id)?;
    if state.store.get(&id).is_none() {
        return Err(TaskError::NotFound.into());
    }

    let stream = async_stream::stream! {
        let mut last: Option<Task> = None;
        loop {
            let Some(task) = state.store.get(&id) else {
                break;
            };

            if task.status().is_terminal() {
                yield Event::default().event("done").json_data(&task);
                break;
            }

            if last.as_ref() != Some(&task) {
                yield Event::default().event("progress").json_data(&task);
                last = Some(task);
            }

            tokio::time::sleep(STREAM_POLL_INTERVAL).await;
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// `GET /api/tasks/:id/export`
pub async fn export_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id).map_err(|_| ApiError::from(export::ExportError::TaskNotReady))?;
    let store = Arc::clone(&state.store);
    let document = tokio::task::spawn_blocking(move || export::export(store.as_ref(), &id))
        .await
        .map_err(|e| ApiError::internal(e.to_string()))??;

    let disposition = format!("attachment; filename=\"{}\"", document.filename);
    Ok((
        [
            (header::CONTENT_TYPE, DOCX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document.bytes,
    )
        .into_response())
}
