//! Router construction and server lifecycle.

use std::sync::Arc;

use axum::middleware;
use axum::{
    extract::{DefaultBodyLimit, Extension, State},
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::llm::{AnthropicClient, GenerationClient};
use crate::task::{sweep_expired, Dispatcher, InMemoryTaskStore, SharedTaskStore, TaskStatus};

use super::auth::{self, AuthUser};
use super::error::ApiError;
use super::tasks;
use super::types::{HealthResponse, StatsResponse};

/// Uploads are small documents; leave headroom for long pasted scripts.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: SharedTaskStore,
    pub dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(config: Config, store: SharedTaskStore, client: Arc<dyn GenerationClient>) -> Self {
        let dispatcher = Dispatcher::new(Arc::clone(&store), client, config.max_concurrent_tasks);
        Self {
            config,
            store,
            dispatcher,
        }
    }
}

/// Build the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route(
            "/api/tasks",
            post(tasks::submit).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/api/tasks/:id", get(tasks::get_task))
        .route("/api/tasks/:id/stream", get(tasks::stream_task))
        .route("/api/tasks/:id/export", get(tasks::export_task))
        .route("/api/admin/stats", get(admin_stats))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let client = AnthropicClient::new(&config.generation);
    tracing::info!(model = %client.model(), "Generation client ready");

    if !config.auth.auth_required(config.dev_mode) {
        tracing::warn!("DEV_MODE is on: API authentication is disabled");
    } else if config.auth.jwt_secret.is_none() {
        tracing::warn!("JWT_SECRET is not set: protected endpoints will refuse every request");
    }

    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::new(
        config,
        InMemoryTaskStore::shared(),
        Arc::new(client),
    ));

    if let Some(interval) = state.config.sweep_interval {
        spawn_sweeper(
            Arc::clone(&state.store),
            state.config.task_retention,
            interval,
        );
    }

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Periodically drop tasks older than `retention`.
fn spawn_sweeper(
    store: SharedTaskStore,
    retention: std::time::Duration,
    interval: std::time::Duration,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; nothing is old enough yet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sweep_expired(store.as_ref(), retention);
        }
    });
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections...");
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        dev_mode: state.config.dev_mode,
        auth_required: state.config.auth.auth_required(state.config.dev_mode),
        model: state.config.generation.model.clone(),
    })
}

/// Task counts by status plus the number of configured accounts. Admin only.
async fn admin_stats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<StatsResponse>, ApiError> {
    user.require_admin()?;

    let tasks = state.store.list();
    let count = |status: TaskStatus| tasks.iter().filter(|t| t.status() == status).count();

    Ok(Json(StatsResponse {
        total_tasks: tasks.len(),
        processing_tasks: count(TaskStatus::Processing),
        completed_tasks: count(TaskStatus::Completed),
        error_tasks: count(TaskStatus::Error),
        user_count: state.config.auth.users.len(),
    }))
}
