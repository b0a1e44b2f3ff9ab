//! Lantern Store order backend.
//!
//! Wires configuration, the Postgres pool, repositories and the order service
//! into the HTTP server, then runs until SIGINT or SIGTERM.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};

use app_config::AppConfig;
use repository::{PgOrdersRepository, PgProductsRepository, PgUsersRepository};
use server::{JwtKeys, Server};
use service::OrderServiceImpl;

/// Initialize the tracing subscriber; `RUST_LOG` overrides the default level.
fn init_logger() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();
    info!("Lantern Store backend starting...");

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db_pool = match db::init_db_pool(&config).await {
        Ok(pool) => {
            info!("Database initialized successfully");
            pool
        }
        Err(e) => {
            error!("Failed to initialize database: {:#}", e);
            return Err(e.context("Database connection is required"));
        }
    };

    let orders_repo = PgOrdersRepository::new(db_pool.clone());
    let products_repo = PgProductsRepository::new(db_pool.clone());
    let users_repo = Arc::new(PgUsersRepository::new(db_pool));

    let order_service = Arc::new(OrderServiceImpl::new(
        orders_repo,
        products_repo,
        config.guest_email.clone(),
    ));

    let jwt = JwtKeys::new(&config.jwt_secret, config.jwt_max_age);
    let http_server = Server::new(config.http_port, order_service, users_repo, jwt);

    if let Err(err) = http_server.start().await {
        error!("HTTP server error: {:#}", err);
        return Err(err);
    }

    info!("Application stopped");
    Ok(())
}
