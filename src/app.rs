use crate::handlers;
use crate::state::AppState;
use axum::{routing::{get, post}, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::health))
        .route("/api/journal", post(handlers::record))
        .route("/api/stats/:subject", get(handlers::get_stats))
        .route("/api/stats/:subject/done", get(handlers::get_done_stats))
        .route("/api/stats/:subject/logins", get(handlers::get_login_stats))
        .with_state(state)
}
