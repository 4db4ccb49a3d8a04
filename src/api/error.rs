//! API error type and its JSON response body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::export::ExportError;
use crate::task::TaskError;

/// An error returned to the client as `{"status": "error", "message": ...}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "status": "error", "message": self.message })),
        )
            .into_response()
    }
}

impl From<TaskError> for ApiError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::InvalidInput(message) => Self::bad_request(message),
            TaskError::NotFound => Self::not_found(err.to_string()),
            TaskError::Store(e) => {
                tracing::error!("Task store rejected a new task: {}", e);
                Self::internal("Could not record the task")
            }
        }
    }
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::TaskNotReady => Self::new(StatusCode::CONFLICT, err.to_string()),
            ExportError::Docx(e) => {
                tracing::error!("Failed to build DOCX export: {}", e);
                Self::internal("Could not build the document")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_errors_map_to_status_codes() {
        let err: ApiError = TaskError::InvalidInput("Invalid word count".to_string()).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Invalid word count");

        let err: ApiError = TaskError::NotFound.into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.message, "Task not found");
    }

    #[test]
    fn test_export_not_ready_is_conflict() {
        let err: ApiError = ExportError::TaskNotReady.into();
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.message, "Task not completed or not found");
    }
}
