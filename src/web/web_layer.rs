// Web layer - axum routes over the core services.

pub mod auth;
pub mod comment_routes;
pub mod error;
pub mod notification_routes;
pub mod state;

use axum::{routing::get, Router};
use state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(comment_routes::router())
        .merge(notification_routes::router())
        .with_state(state)
}
