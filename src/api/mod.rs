//! HTTP API — Axum server in front of the ledger.
//!
//! JSON in, JSON out. Authenticated routes expect an
//! `Authorization: Bearer <token>` header obtained from `/login`.
//! CORS enabled for local development.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

pub use routes::{ApiState, AppState};

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        // Public
        .route("/health", get(routes::health))
        .route("/signup", post(routes::signup))
        .route("/login", post(routes::login))
        .route("/logout", post(routes::logout))
        .route("/events", get(routes::list_events))
        .route("/leaderboard", get(routes::leaderboard))
        .route("/history", get(routes::history))
        // Authenticated
        .route("/me", get(routes::me))
        .route("/bets", post(routes::place_bet))
        .route("/promote", post(routes::promote))
        // Admin
        .route(
            "/admin/events",
            get(routes::admin_events).post(routes::create_event),
        )
        .route("/admin/events/:id/close", post(routes::close_event))
        .route("/admin/users", get(routes::admin_users))
        .route("/admin/users/:username/block", post(routes::toggle_block))
        .layer(cors)
        .with_state(state)
}

/// Serve the API on `addr` until `shutdown` resolves.
pub async fn serve(
    state: AppState,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API address {addr}"))?;

    info!(%addr, "API server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server error")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
