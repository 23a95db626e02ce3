//! `api` crate — HTTP REST surface over the orchestrator. Out of scope for
//! the execution semantics themselves; this is wiring only.
//!
//! Exposes:
//!   GET    /api/v1/agents
//!   POST   /api/v1/agents
//!   GET    /api/v1/agents/:id
//!   POST   /api/v1/agents/:id/execute
//!   POST   /webhook/:path

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use orchestrator::Orchestrator;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub pool: db::DbPool,
    pub orchestrator: Arc<Orchestrator>,
}

pub async fn serve(bind: &str, state: AppState) -> Result<(), std::io::Error> {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let api_router = Router::new()
        .route("/agents", get(handlers::agents::list).post(handlers::agents::create))
        .route("/agents/:id", get(handlers::agents::get))
        .route("/agents/:id/execute", post(handlers::executions::execute));

    let app = Router::new()
        .nest("/api/v1", api_router)
        .route("/webhook/:path", post(handlers::webhooks::handle_webhook))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await
}
