//! Backend for a restaurant ordering API: catalog, role directory, per-user
//! carts and order lifecycle over Postgres.

pub mod acl;
pub mod config;
pub mod controller;
pub mod errors;
pub mod migrations;
pub mod models;
pub mod repos;
pub mod services;

use std::net::SocketAddr;

use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::AppConfig;
use crate::controller::AppState;

/// Connects to the database, applies startup migrations and serves the API
/// until a shutdown signal arrives.
pub async fn start_server(config: AppConfig) {
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.db.dsn)
        .await
        .expect("Failed to create database connection pool");
    migrations::run(&db_pool)
        .await
        .expect("Failed to apply startup migrations");

    let app = controller::routing::make_router(AppState::pg(db_pool));

    let addr = SocketAddr::new(config.listen.host, config.listen.port);
    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind listen address");
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server failure");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutting down");
}
