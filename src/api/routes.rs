//! Route definitions for the content and control listeners.

use std::path::Path;

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::api::handlers::{self, ControlState};

/// Build the shaping control router.
///
/// Every path answers, GET only.
pub fn build_control_router(state: ControlState) -> Router {
    // Browser-based players call the control port from the content origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::shape_traffic))
        .route("/*path", get(handlers::shape_traffic))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Build the static content router serving `root`.
pub fn build_content_router(root: &Path) -> Router {
    Router::new()
        .fallback_service(ServeDir::new(root))
        .layer(TraceLayer::new_for_http())
}
