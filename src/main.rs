//! plotpointe server entry point.

use tracing_subscriber::EnvFilter;

use plotpointe::{api, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; real deployments set the environment directly.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.host,
        port = config.port,
        max_concurrent_tasks = config.max_concurrent_tasks,
        "plotpointe starting"
    );

    api::serve(config).await
}
