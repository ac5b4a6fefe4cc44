//! Dashboard server with graceful shutdown

use axum::Router;
use std::net::SocketAddr;
use tokio::signal;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::routes::api_router;
use crate::state::AppState;

/// Server configuration
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Listen address
    pub addr: SocketAddr,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
        }
    }
}

impl DashboardConfig {
    /// Create from environment variables
    ///
    /// Reads `JOBQ_DASHBOARD_ADDR` (e.g. `0.0.0.0:8080`); invalid values fall
    /// back to the default.
    pub fn from_env() -> Self {
        let addr = std::env::var("JOBQ_DASHBOARD_ADDR")
            .ok()
            .and_then(|a| match a.parse() {
                Ok(addr) => Some(addr),
                Err(_) => {
                    tracing::warn!(value = %a, "Ignoring invalid JOBQ_DASHBOARD_ADDR");
                    None
                }
            });

        match addr {
            Some(addr) => Self { addr },
            None => Self::default(),
        }
    }
}

pub struct DashboardServer {
    config: DashboardConfig,
    state: AppState,
}

impl DashboardServer {
    pub fn new(config: DashboardConfig, state: AppState) -> Self {
        Self { config, state }
    }

    pub fn router(&self) -> Router {
        api_router(self.state.clone()).layer(TraceLayer::new_for_http())
    }

    /// Serve until Ctrl+C or SIGTERM
    pub async fn run(self) -> Result<(), ApiError> {
        let app = self.router();
        let addr = self.config.addr;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ApiError::Internal(format!("Failed to bind {}: {}", addr, e)))?;

        tracing::info!("Dashboard listening on http://{}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

        tracing::info!("Dashboard shutdown complete");
        Ok(())
    }
}

/// Graceful shutdown signal handler
pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
