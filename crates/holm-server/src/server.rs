use std::sync::Arc;

use holm_db::Database;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// The Holm HTTP server.
///
/// Owns a [`ServerConfig`] and, once [`serve`](HolmServer::serve) is called,
/// the [`Database`] it exposes. The server runs until it receives a shutdown
/// signal (Ctrl-C or SIGTERM), then flushes the database before returning.
pub struct HolmServer {
    config: ServerConfig,
}

impl HolmServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Open the database at the configured data directory and serve it.
    pub async fn serve(self) -> ServerResult<()> {
        let db = Database::open_with(&self.config.data_dir, self.config.db_options())?;
        self.serve_with(Arc::new(db)).await
    }

    /// Serve an already-open database.
    ///
    /// Useful for embedding: the caller keeps a handle to the same `Database`
    /// and can issue local operations while the server runs.
    pub async fn serve_with(self, db: Arc<Database>) -> ServerResult<()> {
        let state = AppState {
            db: Arc::clone(&db),
        };
        let app = build_router(state);

        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, author = %db.author().short_id(), "listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;

        db.close()?;
        Ok(())
    }
}

/// Resolve when the process is asked to stop.
///
/// Listens for Ctrl-C everywhere and SIGTERM on unix. A signal handler that
/// fails to register must never resolve, otherwise the server would shut down
/// immediately after starting.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install ctrl-c handler");
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
            Err(e) => {
                warn!(error = %e, "failed to install sigterm handler");
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
    info!("shutdown signal received");
}
