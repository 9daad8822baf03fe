//! HTTP routes for the realtime endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    authorize_channel, cleanup, end_session, fetch_control_state, fetch_whiteboard, join_session,
    leave_session, relay_signal, request_controller_change, request_spotlight, start_session,
    update_whiteboard, LiveHandlers,
};

/// Creates the realtime router with all endpoints.
///
/// Mounted under `/api/live` by the binary; the auth middleware is layered
/// on top there.
pub fn live_routes(handlers: LiveHandlers) -> Router {
    Router::new()
        .route("/sessions", post(start_session))
        .route("/sessions/:id/join", post(join_session))
        .route("/sessions/:id/leave", post(leave_session))
        .route("/sessions/:id/end", post(end_session))
        .route("/sessions/:id/signal", post(relay_signal))
        .route(
            "/sessions/:id/whiteboard",
            post(update_whiteboard).get(fetch_whiteboard),
        )
        .route("/sessions/:id/spotlight", post(request_spotlight))
        .route("/sessions/:id/controller", post(request_controller_change))
        .route("/sessions/:id/control", get(fetch_control_state))
        .route("/cleanup", post(cleanup))
        .route("/bus/auth", post(authorize_channel))
        .with_state(handlers)
}
