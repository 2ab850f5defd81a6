//! # Server Module
//!
//! HTTP server setup and route configuration for the market server.

use axum::http::StatusCode;
use axum::response::Json;
use axum::Router;
use axum::routing::get;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::auth::jwt::TokenService;
use crate::config::Config;
use crate::database::connection::DatabaseConnection;
use crate::database::migrations::run_migrations;
use crate::routes::health::{health, ping};
use crate::routes::{order, org, product, user};
use crate::services::upload::ImageStore;

/// Application state shared across all route handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub tokens: Arc<TokenService>,
    pub images: Arc<ImageStore>,
}

/// Starts the market HTTP server.
///
/// Connects to the database, applies pending migrations, wires up the route
/// table with its auth middleware, and serves until the process terminates.
pub async fn start(config: Config) -> anyhow::Result<()> {
    // Initialize database connection and bring the schema up to date
    let db = Arc::new(DatabaseConnection::from_url(&config.database_url).await?);
    run_migrations(db.pool()).await?;

    let tokens = Arc::new(TokenService::new(&config.jwt_secret));
    let images = Arc::new(ImageStore::new(config.upload));

    let app_state = AppState { db, tokens, images };

    // Main app router. User/order/product/org routers attach their own
    // token-validation and admin layers internally.
    let app = Router::new()
        .route("/ping", get(ping)) // Health check endpoint
        .route("/health", get(health))
        .merge(user::create_user_routes(app_state.clone()))
        .merge(order::create_order_routes(app_state.clone()))
        .merge(product::create_product_routes(app_state.clone()))
        .merge(org::create_org_routes(app_state.clone()))
        .fallback(not_found)
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(app_state);

    let addr: std::net::SocketAddr =
        format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("🚀 Market server starting...");
    tracing::info!("📡 Listening on http://{}", addr);
    tracing::info!("🏥 Health check available at http://{}/ping", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Unknown routes get the standard response envelope instead of an empty 404.
async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "success": false, "message": "route not found" })),
    )
}
