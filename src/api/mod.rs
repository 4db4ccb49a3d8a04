//! HTTP API.
//!
//! ## Endpoints
//! - `GET  /api/health`: liveness and auth mode (public)
//! - `POST /api/auth/login`: exchange a username and password for a JWT (public)
//! - `POST /api/tasks`: submit a script rewrite, story or plot task (multipart)
//! - `GET  /api/tasks/:id`: poll a task record
//! - `GET  /api/tasks/:id/stream`: SSE `progress` events, then `done`
//! - `GET  /api/tasks/:id/export`: download a completed result as `.docx`
//! - `GET  /api/admin/stats`: task counts by status (admin only)

mod auth;
mod error;
mod routes;
mod tasks;
pub mod types;

pub use auth::AuthUser;
pub use error::ApiError;
pub use routes::{create_router, serve, AppState};
