//! # Market Server
//!
//! REST backend for a small marketplace: user accounts with token-based
//! sessions, a product catalog, an organization directory, per-user carts,
//! and order checkout. Built with Axum and Tokio on PostgreSQL.
//!
//! ## Architecture
//! The server is organized into modules:
//! - `server`: Core server initialization and route wiring
//! - `config`: Environment variable configuration management
//! - `auth`: Token issuing, validation middleware, and the admin gate
//! - `database`: Connection pool, migrations, and row models
//! - `services`: External collaborators (image store)
//! - `routes`: HTTP route handlers organized by domain
//!
//! ## Environment Setup
//! Required variables: `JWT_SECRET`, `DATABASE_URL`, `UPLOAD_ENDPOINT`,
//! `UPLOAD_API_KEY`. Optional: `SERVER_HOST`, `PORT`, `RUST_LOG`.
//!
//! ## Running the Server
//! ```bash
//! cargo run
//! ```

mod auth;
mod config;
mod database;
mod error;
mod routes;
mod server;
mod services;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point.
///
/// Initializes the tracing subscriber, loads configuration, and starts the
/// HTTP server. Runs until the process is terminated.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Console output with compact formatting; level via RUST_LOG, INFO default
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false).compact())
        .init();

    tracing::info!(
        "🏁 Starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let config = config::Config::from_env()?;
    server::start(config).await
}
