//! Web server module.

mod handlers;

pub use handlers::*;

use crate::config::ServerConfig;
use crate::summary::SummaryCache;

use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub cache: Arc<SummaryCache>,
}

/// Web server for LinkPulse.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(config: Arc<ServerConfig>, cache: Arc<SummaryCache>) -> Self {
        Self {
            state: AppState { config, cache },
        }
    }

    /// Build the router with all routes.
    fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

        Router::new()
            // Dashboard
            .route("/", get(handlers::handle_dashboard))
            // Raw records
            .route("/data", get(handlers::handle_data))
            .route("/day", get(handlers::handle_day))
            // Daily summary
            .route("/daily", get(handlers::handle_daily))
            .route("/rebuild-summaries", post(handlers::handle_rebuild))
            // Runtime configuration
            .route("/config", post(handlers::handle_update_config))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Serve until the shutdown future resolves.
    pub async fn start(
        &self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}
