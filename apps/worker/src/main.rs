use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use resonance_worker::jobs::{self, Library};
use resonance_worker::{routes, Config, TaskManager};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resonance_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        environment = %config.environment(),
        library = %config.music_library_path().display(),
        schedule = %config.schedule,
        "Starting Resonance worker"
    );

    let library = Library::new(1, "music", config.music_library_path().clone());
    let manager = TaskManager::new(
        jobs::registrations(library),
        config.schedule.clone(),
        config.manager_options(),
    )?;
    let worker = manager.start()?;

    let listener = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.http_addr))?;
    tracing::info!("Listening on {}", config.http_addr);

    axum::serve(listener, routes::router(manager.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down worker");
    manager.stop();
    worker.await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
