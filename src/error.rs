//! Error types for the shaping node.
//!
//! Defines a unified error type for startup and lifecycle failures that also
//! maps cleanly to HTTP responses when a handler hits one.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Unified error type for node operations.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Address resolution error: {0}")]
    AddressResolution(String),

    #[error("Failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for NodeError {
    fn into_response(self) -> Response {
        // Everything here is operator-facing; clients only get a generic line.
        tracing::error!(error = %self, "Request failed");

        let status = match &self {
            NodeError::Config(_) | NodeError::AddressResolution(_) | NodeError::Bind { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            NodeError::Lifecycle(_) | NodeError::Io(_) | NodeError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, "Internal Error\n").into_response()
    }
}

/// Result type alias for node operations.
pub type NodeResult<T> = Result<T, NodeError>;
