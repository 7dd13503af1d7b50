//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::error::{NodeError, NodeResult};
use crate::shaping::ShapingController;

/// State for the shaping control endpoint.
#[derive(Clone)]
pub struct ControlState {
    pub controller: Arc<ShapingController>,
    /// Answer value errors with 400 instead of 200.
    pub strict_status: bool,
}

/// Adjust traffic shaping from query parameters.
///
/// GET /?rate=<kbit/s>&delay=<ms>&jitter=<ms>&packet_error=<percent>
///
/// Echoes `key=value` for each recognized key, or `<key> Value Error` when a
/// value is not a non-negative integer.
pub async fn shape_traffic(
    State(state): State<ControlState>,
    Query(query): Query<Vec<(String, String)>>,
) -> NodeResult<Response> {
    tracing::info!(
        keys = ?query.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
        "Shaping request"
    );

    let controller = Arc::clone(&state.controller);
    let outcome = tokio::task::spawn_blocking(move || controller.handle_request(&query))
        .await
        .map_err(|e| NodeError::Internal(format!("shaping task failed: {e}")))?;

    let response = match outcome {
        Ok(ack) => {
            tracing::debug!(applied = ack.applied, "Shaping request accepted");
            (StatusCode::OK, ack.to_string()).into_response()
        }
        Err(e) => {
            let status = if state.strict_status {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::OK
            };
            (status, format!("{e}\n")).into_response()
        }
    };

    Ok(response)
}
