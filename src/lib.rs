//! Gutter Server Library
//!
//! Locates the gutter of scanned two-page spreads and predicts where to cut
//! them. The pipeline lives in [`split`]; [`db`] persists trained models and
//! labeled examples; [`routes`] exposes both over HTTP. The server binary is
//! in main.rs.

pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod split;
pub mod state;

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the application router
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = state.config().server.max_image_bytes;

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/v1/health", get(routes::health::health_check))
        .nest("/api/v1/spreads", routes::spreads::router())
        .nest("/api/v1/models", routes::models::router())
        .nest("/api/v1/training", routes::training::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
