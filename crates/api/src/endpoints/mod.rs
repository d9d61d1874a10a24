//! API endpoints.

mod admin;
mod auth;
mod rooms;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .nest("/rooms", rooms::router())
        .nest("/admin", admin::router())
}
