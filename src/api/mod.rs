//! HTTP API layer for the shaping node.
//!
//! Provides the shaping control endpoint and the static content service.

pub mod handlers;
mod routes;

pub use handlers::ControlState;
pub use routes::{build_content_router, build_control_router};
