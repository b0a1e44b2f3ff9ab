//! HTTP surface of the store: order routes, admin guard, health and metrics.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::{get, post, put};
use axum::Router;
use repository::UsersRepository;
use service::OrderService;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

pub mod auth;
pub mod error;
mod handlers;
pub mod metrics;

pub use auth::{AccessClaims, AdminUser, JwtKeys};
pub use error::ApiError;
pub use metrics::Metrics;

/// Application state shared between request handlers.
#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<dyn OrderService>,
    pub users: Arc<dyn UsersRepository>,
    pub jwt: Arc<JwtKeys>,
    pub metrics: Arc<Metrics>,
}

/// Server represents the HTTP server for the order API.
pub struct Server {
    port: u16,
    state: AppState,
}

impl Server {
    pub fn new(
        port: u16,
        orders: Arc<dyn OrderService>,
        users: Arc<dyn UsersRepository>,
        jwt: JwtKeys,
    ) -> Self {
        info!("Initializing HTTP server on port {}", port);

        Self {
            port,
            state: AppState {
                orders,
                users,
                jwt: Arc::new(jwt),
                metrics: Arc::new(Metrics::new()),
            },
        }
    }

    /// Starts the server and blocks until it's shut down.
    pub async fn start(&self) -> Result<()> {
        let app = self.router();

        let listener = TcpListener::bind(("0.0.0.0", self.port))
            .await
            .context("Failed to bind to port")?;

        info!("HTTP server listening on port {}", self.port);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Server error")?;

        info!("HTTP server shut down gracefully");
        Ok(())
    }

    pub fn router(&self) -> Router {
        let metrics = self.state.metrics.clone();

        let api = Router::new()
            .route(
                "/orders",
                post(handlers::create_order).get(handlers::get_orders_by_phone),
            )
            .route("/orders/all", get(handlers::get_all_orders))
            .route("/orders/stats", get(handlers::order_stats))
            .route("/orders/{id}", put(handlers::update_order))
            .route("/orders/{id}/status", put(handlers::update_order_status))
            .route("/orders/{id}/admin", put(handlers::update_order_admin));

        Router::new()
            .nest("/api", api)
            .route("/health", get(handlers::health))
            .route("/metrics", get(handlers::metrics))
            .layer(axum::middleware::from_fn_with_state(metrics, metrics::track))
            .with_state(self.state.clone())
    }
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use repository::InMemoryStore;
    use service::OrderServiceImpl;
    use std::time::Duration;

    #[test]
    fn test_server_creation() {
        let store = Arc::new(InMemoryStore::new());
        let service = OrderServiceImpl::new(store.clone(), store.clone(), "guest@lanternstore.com");
        let server = Server::new(
            8080,
            Arc::new(service),
            store,
            JwtKeys::new("secret", Duration::from_secs(60)),
        );
        assert_eq!(server.port, 8080);
    }
}
