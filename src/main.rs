use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;

use clicker_sync_service::config::Settings;
use clicker_sync_service::server::{create_app, AppState};
use clicker_sync_service::store::create_state_store;
use clicker_sync_service::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing
    let _telemetry = init_telemetry(&settings.otel)?;
    tracing::info!(
        store_backend = settings.store.backend.as_str(),
        tick_interval_ms = settings.tick.interval_ms,
        "Configuration loaded"
    );

    // Create state store and application state
    let store = create_state_store(&settings)?;
    let state = AppState::new(settings.clone(), store);
    tracing::info!("Application state initialized");

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Start tick scheduler in background
    let tick_scheduler = state.tick_scheduler();
    let tick_handle = tokio::spawn(tick_scheduler.run(shutdown_tx.subscribe()));

    // Create Axum app
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(shutdown_tx.clone()))
        .await?;

    // Stop the scheduler even if the server exited on its own
    let _ = shutdown_tx.send(());

    tracing::info!("Waiting for background tasks to finish...");
    if let Err(e) = tick_handle.await {
        tracing::error!(error = %e, "Tick scheduler task failed");
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }

    // Stop the tick scheduler
    let _ = shutdown_tx.send(());
}
