use std::sync::Arc;

use danci_srs::clock::SystemClock;
use danci_srs::config::Config;
use danci_srs::services::ReviewStateService;
use danci_srs::workers::WorkerManager;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    let _log_guard = danci_srs::logging::init_tracing(&config.log_level, config.file_log_dir.as_deref());

    let store = match danci_srs::open_store(&config).await {
        Ok(store) => store,
        Err(err) => {
            tracing::error!(error = %err, path = %config.sqlite_path.display(), "review state store not initialized");
            std::process::exit(1);
        }
    };
    tracing::info!(backend = store.backend_name(), "review state store ready");

    let service = Arc::new(ReviewStateService::new(
        store,
        Arc::new(SystemClock),
        config.scheduler,
    ));

    let worker_manager = match WorkerManager::new(Arc::clone(&service)).await {
        Ok(manager) => {
            if let Err(e) = manager
                .start(config.reminder_worker_enabled, &config.reminder_schedule)
                .await
            {
                tracing::error!(error = %e, "failed to start workers");
            }
            Some(manager)
        }
        Err(e) => {
            tracing::warn!(error = %e, "worker manager not initialized");
            None
        }
    };

    let app = danci_srs::create_app(service);

    let addr = config.bind_addr();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, %addr, "bind listener failed");
            std::process::exit(1);
        }
    };
    tracing::info!(%addr, "danci-srs listening");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    if let Err(e) = server.await {
        tracing::error!(error = %e, "server error");
    }

    tracing::info!("HTTP server stopped, initiating graceful shutdown sequence");

    if let Some(ref manager) = worker_manager {
        manager.stop().await;
    }

    tracing::info!("Graceful shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
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
}
