//! Server setup and lifecycle for the chat server.

use std::net::SocketAddr;
use std::sync::Arc;

use config::Config;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;

use crate::routes::create_router;
use crate::state::AppState;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid listen address {addr}: {reason}")]
    Address { addr: String, reason: String },

    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),

    #[error("Failed to install metrics recorder: {0}")]
    Metrics(#[from] BuildError)
}

/// The report assistant HTTP server.
pub struct ChatServer {
    state: Arc<AppState>,
    addr: SocketAddr
}

impl ChatServer {
    /// Builds the server from configuration, installing the global
    /// Prometheus recorder when metrics are enabled.
    pub fn new(config: &Config) -> Result<Self, ServerError> {
        let metrics = if config.observability.metrics_enabled {
            Some(install_metrics_recorder()?)
        } else {
            None
        };
        let addr = listen_addr(config)?;
        Ok(Self::with_state(Arc::new(AppState::from_config(config, metrics)), addr))
    }

    /// Creates a server instance from an existing `AppState`.
    pub fn with_state(state: Arc<AppState>, addr: SocketAddr) -> Self {
        Self { state, addr }
    }

    /// Runs the HTTP server until Ctrl+C or SIGTERM.
    ///
    /// In-flight streams are allowed to finish during graceful shutdown.
    pub async fn run(self) -> Result<(), ServerError> {
        let router = create_router(self.state.clone());
        let addr = self.addr;

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        tracing::info!(%addr, "Report assistant server starting");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(ServerError::Serve)?;

        tracing::info!("Report assistant server stopped");
        Ok(())
    }

    #[must_use]
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

fn listen_addr(config: &Config) -> Result<SocketAddr, ServerError> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    addr.parse().map_err(|e: std::net::AddrParseError| ServerError::Address {
        reason: e.to_string(),
        addr
    })
}

fn install_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Signal handler for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        () = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        },
    }
}
