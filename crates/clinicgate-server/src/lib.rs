//! clinicgate API gateway
//!
//! Admission control in front of the patient-portal API. Every request passes
//! one fixed-window rate limit gate before it reaches a handler; operators can
//! inspect and reset the counters over the internal routes.
//!
//! # Architecture
//!
//! - **Routes**: gateway endpoints and the internal admin surface
//! - **Middleware**: session boundary and rate limit gates
//! - **Config**: layered configuration with startup validation
//! - **Shutdown**: signal handling and graceful drain

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod shutdown;
pub mod state;

pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use state::AppState;

use anyhow::Context;
use axum::Router;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Server builder for constructing and running the API server.
pub struct Server {
    config: Arc<ServerConfig>,
    state: AppState,
}

impl Server {
    /// Validate `config` and build the shared state.
    pub fn new(config: ServerConfig) -> Result<Self, anyhow::Error> {
        if let Err(errors) = crate::config::validate_config(&config) {
            let details = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            anyhow::bail!("Invalid configuration: {details}");
        }

        let state = AppState::new(config).context("Failed to build rate limit registry")?;
        Ok(Self {
            config: state.config.clone(),
            state,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Result<Router, anyhow::Error> {
        Ok(routes::create_router(self.state.clone())
            .context("Failed to build rate limit gates")?
            .layer(TraceLayer::new_for_http()))
    }

    /// Run the server until a shutdown signal arrives.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let addr = self.addr()?;
        let router = self.router()?;
        let shutdown = self.state.shutdown.clone();

        let cleanup = self.config.rate_limit.enabled.then(|| {
            self.state
                .rate_limits
                .spawn_cleanup(self.config.rate_limit.cleanup_interval())
        });

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;
        info!(%addr, "Server listening");

        tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                shutdown::shutdown_signal().await;
                shutdown.initiate();
            }
        });

        let serve = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move { shutdown.wait_for_signal().await }
        })
        .into_future();

        let drain_deadline = {
            let shutdown = shutdown.clone();
            async move {
                shutdown.wait_for_signal().await;
                tokio::time::sleep(shutdown.drain_timeout()).await;
            }
        };

        tokio::select! {
            result = serve => result.context("Server error")?,
            _ = drain_deadline => {
                warn!("Drain timeout elapsed, closing remaining connections");
            }
        }

        if let Some(cleanup) = cleanup {
            cleanup.stop().await;
        }
        shutdown.complete();
        Ok(())
    }

    /// Get the server's socket address.
    pub fn addr(&self) -> Result<SocketAddr, anyhow::Error> {
        self.config
            .server
            .socket_addr()
            .context("Invalid bind address")
    }
}
