//! Request and response bodies.

use serde::{Deserialize, Serialize};

use crate::config::UserRole;
use crate::task::TaskId;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub status: &'static str,
    pub token: String,
    /// Expiry, unix seconds.
    pub exp: i64,
    pub username: String,
    pub role: UserRole,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub dev_mode: bool,
    pub auth_required: bool,
    pub model: String,
}

/// Reply to an accepted submission.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub status: String,
    pub task_id: TaskId,
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatsResponse {
    pub total_tasks: usize,
    pub processing_tasks: usize,
    pub completed_tasks: usize,
    pub error_tasks: usize,
    pub user_count: usize,
}
