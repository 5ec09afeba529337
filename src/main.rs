use std::net::SocketAddr;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use project_tracker::Backend;
use project_tracker::config::{Config, StorageBackend};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    tracing::info!("Starting project tracker");

    let backend = match (config.storage, config.database_url.as_deref()) {
        (StorageBackend::Postgres, Some(url)) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .acquire_timeout(Duration::from_secs(5))
                .connect(url)
                .await?;

            sqlx::migrate!("./migrations").run(&pool).await?;
            tracing::info!("Migrations applied");

            Backend::postgres(pool)
        }
        (StorageBackend::Postgres, None) => return Err("DATABASE_URL is required".into()),
        (StorageBackend::Memory, _) => {
            tracing::warn!("Using in-memory storage; data is lost on shutdown");
            Backend::memory()
        }
    };

    let addr = SocketAddr::new(config.host, config.port);
    let (app, state) = project_tracker::build_app(backend, config);

    state.auth.seed_roles().await?;
    tracing::info!("Roles seeded");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let housekeeping = tokio::spawn(project_tracker::worker::run_housekeeping(
        state.clone(),
        shutdown_rx,
        Duration::from_secs(60),
    ));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    let _ = housekeeping.await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
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

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
