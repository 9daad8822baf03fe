//! HTTP handlers for the realtime endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::application::{
    ControlError, ControlHandoff, RelayError, SessionLifecycle, SignalRelay, SyncError,
    WhiteboardSync,
};
use crate::domain::channels::{ChannelName, Visibility};
use crate::domain::foundation::{ClassroomId, ErrorCode, SessionId, SocketId, Timestamp, UserId};
use crate::domain::session::SessionError;
use crate::domain::signaling::SignalEnvelope;
use crate::ports::{
    MessageBus, PresenceMember, PublishError, SessionRegistry, SubscriptionAuthError,
    SubscriptionRequest,
};

use super::dto::{
    BusAuthRequest, CleanupResponse, ControlRequest, ControlStateResponse, ErrorResponse,
    SessionStartedResponse, SignalRequest, StartSessionRequest, WhiteboardFetchResponse,
    WhiteboardUpdateRequest, WhiteboardUpdateResponse,
};
use super::middleware::RequireAuth;

// ════════════════════════════════════════════════════════════════════════════
// Handler state
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct LiveHandlers {
    lifecycle: Arc<SessionLifecycle>,
    relay: Arc<SignalRelay>,
    whiteboard: Arc<WhiteboardSync>,
    control: Arc<ControlHandoff>,
    registry: Arc<dyn SessionRegistry>,
    bus: Arc<dyn MessageBus>,
}

impl LiveHandlers {
    pub fn new(
        lifecycle: Arc<SessionLifecycle>,
        relay: Arc<SignalRelay>,
        whiteboard: Arc<WhiteboardSync>,
        control: Arc<ControlHandoff>,
        registry: Arc<dyn SessionRegistry>,
        bus: Arc<dyn MessageBus>,
    ) -> Self {
        Self {
            lifecycle,
            relay,
            whiteboard,
            control,
            registry,
            bus,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Session lifecycle
// ════════════════════════════════════════════════════════════════════════════

/// POST /sessions - Teacher starts a live session
pub async fn start_session(
    State(handlers): State<LiveHandlers>,
    RequireAuth(user): RequireAuth,
    Json(req): Json<StartSessionRequest>,
) -> Response {
    let classroom_id = ClassroomId::from_uuid(req.classroom_id);

    match handlers.lifecycle.start(&user, classroom_id).await {
        Ok(session_id) => (
            StatusCode::CREATED,
            Json(SessionStartedResponse {
                session_id: session_id.to_string(),
            }),
        )
            .into_response(),
        Err(e) => handle_session_error(e),
    }
}

/// POST /sessions/:id/join
pub async fn join_session(
    State(handlers): State<LiveHandlers>,
    RequireAuth(user): RequireAuth,
    Path(session_id): Path<String>,
) -> Response {
    let session_id = match parse_session_id(&session_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match handlers.lifecycle.join(session_id, &user).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => handle_session_error(e),
    }
}

/// POST /sessions/:id/leave
pub async fn leave_session(
    State(handlers): State<LiveHandlers>,
    RequireAuth(user): RequireAuth,
    Path(session_id): Path<String>,
) -> Response {
    let session_id = match parse_session_id(&session_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match handlers.lifecycle.leave(session_id, &user.user_id).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => handle_session_error(e),
    }
}

/// POST /sessions/:id/end - Teacher ends the session
pub async fn end_session(
    State(handlers): State<LiveHandlers>,
    RequireAuth(user): RequireAuth,
    Path(session_id): Path<String>,
) -> Response {
    let session_id = match parse_session_id(&session_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match handlers.lifecycle.end(session_id, &user.user_id).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => handle_session_error(e),
    }
}

/// POST /cleanup - Sweep expired sessions on demand
pub async fn cleanup(
    State(handlers): State<LiveHandlers>,
    RequireAuth(_user): RequireAuth,
) -> Response {
    let cleaned = handlers.lifecycle.sweep_expired().await;
    (StatusCode::OK, Json(CleanupResponse { cleaned })).into_response()
}

// ════════════════════════════════════════════════════════════════════════════
// Signaling
// ════════════════════════════════════════════════════════════════════════════

/// POST /sessions/:id/signal - Relay a signaling envelope
pub async fn relay_signal(
    State(handlers): State<LiveHandlers>,
    RequireAuth(user): RequireAuth,
    Path(session_id): Path<String>,
    Json(req): Json<SignalRequest>,
) -> Response {
    let session_id = match parse_session_id(&session_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    if let Err(response) = ensure_self(&req.user_id, &user.user_id) {
        return response;
    }

    let envelope = SignalEnvelope {
        session_id,
        sender_id: req.user_id,
        target_id: req.target,
        signal: req.signal,
        is_return_signal: req.is_return_signal,
    };

    match handlers.relay.relay(envelope).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => handle_relay_error(e),
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Whiteboard
// ════════════════════════════════════════════════════════════════════════════

/// POST /sessions/:id/whiteboard - Publish a whiteboard update
pub async fn update_whiteboard(
    State(handlers): State<LiveHandlers>,
    RequireAuth(user): RequireAuth,
    Path(session_id): Path<String>,
    Json(req): Json<WhiteboardUpdateRequest>,
) -> Response {
    let session_id = match parse_session_id(&session_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    if let Err(response) = ensure_self(&req.sender_id, &user.user_id) {
        return response;
    }

    match handlers
        .whiteboard
        .publish_update(session_id, req.snapshot, req.sender_id)
        .await
    {
        Ok(receipt) => (
            StatusCode::ACCEPTED,
            Json(WhiteboardUpdateResponse {
                persisted: receipt.persisted,
            }),
        )
            .into_response(),
        Err(e) => handle_sync_error(e),
    }
}

/// GET /sessions/:id/whiteboard - Pull the latest snapshot
pub async fn fetch_whiteboard(
    State(handlers): State<LiveHandlers>,
    RequireAuth(_user): RequireAuth,
    Path(session_id): Path<String>,
) -> Response {
    let session_id = match parse_session_id(&session_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match handlers.whiteboard.fetch_latest(&session_id).await {
        Ok(snapshot) => (
            StatusCode::OK,
            Json(WhiteboardFetchResponse::from(snapshot)),
        )
            .into_response(),
        Err(e) => handle_sync_error(e),
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Control handoff
// ════════════════════════════════════════════════════════════════════════════

/// POST /sessions/:id/spotlight
pub async fn request_spotlight(
    State(handlers): State<LiveHandlers>,
    RequireAuth(user): RequireAuth,
    Path(session_id): Path<String>,
    Json(req): Json<ControlRequest>,
) -> Response {
    let session_id = match parse_session_id(&session_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    if let Err(response) = ensure_self(&req.requester_id, &user.user_id) {
        return response;
    }

    match handlers
        .control
        .request_spotlight(session_id, &req.requester_id, req.target_id)
        .await
    {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => handle_control_error(e),
    }
}

/// POST /sessions/:id/controller
pub async fn request_controller_change(
    State(handlers): State<LiveHandlers>,
    RequireAuth(user): RequireAuth,
    Path(session_id): Path<String>,
    Json(req): Json<ControlRequest>,
) -> Response {
    let session_id = match parse_session_id(&session_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    if let Err(response) = ensure_self(&req.requester_id, &user.user_id) {
        return response;
    }

    match handlers
        .control
        .request_controller_change(session_id, &req.requester_id, req.target_id)
        .await
    {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => handle_control_error(e),
    }
}

/// GET /sessions/:id/control
pub async fn fetch_control_state(
    State(handlers): State<LiveHandlers>,
    RequireAuth(_user): RequireAuth,
    Path(session_id): Path<String>,
) -> Response {
    let session_id = match parse_session_id(&session_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match handlers.control.fetch_control_state(session_id).await {
        Ok(state) => (StatusCode::OK, Json(ControlStateResponse::from(state))).into_response(),
        Err(e) => handle_control_error(e),
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Bus subscription handshake
// ════════════════════════════════════════════════════════════════════════════

/// POST /bus/auth - Authorize a presence/private channel subscription.
///
/// Membership is proven here against live session state; the bus adapter
/// then signs the handshake for whichever backend is active.
pub async fn authorize_channel(
    State(handlers): State<LiveHandlers>,
    RequireAuth(user): RequireAuth,
    Json(req): Json<BusAuthRequest>,
) -> Response {
    let channel = match ChannelName::parse(&req.channel_name) {
        Some(channel) => channel,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::bad_request("Unknown channel name")),
            )
                .into_response()
        }
    };
    let socket_id = match SocketId::new(req.socket_id) {
        Ok(socket_id) => socket_id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::bad_request("Missing socket id")),
            )
                .into_response()
        }
    };

    // Membership proof per visibility class.
    match channel.visibility() {
        Visibility::Public => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::bad_request(
                    "Public channels do not require authorization",
                )),
            )
                .into_response()
        }
        Visibility::Presence => {
            let is_member = match channel.session_id() {
                Some(session_id) => match handlers.registry.get(&session_id).await {
                    Some(handle) => {
                        let session = handle.read().await;
                        let now = Timestamp::now();
                        !session.is_expired(&now) && session.is_participant(&user.user_id)
                    }
                    None => false,
                },
                None => false,
            };
            if !is_member {
                return (
                    StatusCode::FORBIDDEN,
                    Json(ErrorResponse::forbidden("Not a participant of this session")),
                )
                    .into_response();
            }
        }
        Visibility::PrivatePair => {
            if !channel.includes_pair_member(&user.user_id) {
                return (
                    StatusCode::FORBIDDEN,
                    Json(ErrorResponse::forbidden("Not a member of this conversation")),
                )
                    .into_response();
            }
        }
    }

    let member = PresenceMember {
        user_id: user.user_id,
        role: user.role,
    };
    let request = SubscriptionRequest { socket_id, channel };

    match handlers.bus.authorize_subscription(&request, &member) {
        Ok(auth) => (StatusCode::OK, Json(auth)).into_response(),
        Err(SubscriptionAuthError::Forbidden(msg)) => {
            (StatusCode::FORBIDDEN, Json(ErrorResponse::forbidden(msg))).into_response()
        }
        Err(SubscriptionAuthError::Invalid(msg)) => {
            (StatusCode::BAD_REQUEST, Json(ErrorResponse::bad_request(msg))).into_response()
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Helpers & error handling
// ════════════════════════════════════════════════════════════════════════════

fn parse_session_id(raw: &str) -> Result<SessionId, Response> {
    raw.parse::<SessionId>().map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::bad_request("Invalid session ID")),
        )
            .into_response()
    })
}

/// Request bodies carry the acting user id; it must match the caller's
/// authenticated identity.
fn ensure_self(claimed: &UserId, authenticated: &UserId) -> Result<(), Response> {
    if claimed == authenticated {
        Ok(())
    } else {
        Err((
            StatusCode::FORBIDDEN,
            Json(ErrorResponse::forbidden(
                "User id does not match authenticated identity",
            )),
        )
            .into_response())
    }
}

fn handle_session_error(error: SessionError) -> Response {
    let status = match &error {
        SessionError::NotFound(_) => StatusCode::NOT_FOUND,
        SessionError::Expired => StatusCode::GONE,
        SessionError::Full { .. } => StatusCode::CONFLICT,
        SessionError::AlreadyEnded => StatusCode::CONFLICT,
        SessionError::Forbidden => StatusCode::FORBIDDEN,
        SessionError::UnknownParticipant(_) => StatusCode::NOT_FOUND,
        SessionError::Directory(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse::new(error.message(), error.code().to_string())),
    )
        .into_response()
}

fn handle_relay_error(error: RelayError) -> Response {
    match error {
        RelayError::UnknownSession(id) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::not_found("Session", &id.to_string())),
        )
            .into_response(),
        RelayError::SessionExpired => (
            StatusCode::GONE,
            Json(ErrorResponse::new(
                "Session has expired",
                ErrorCode::SessionExpired.to_string(),
            )),
        )
            .into_response(),
        RelayError::UnknownParticipant(user_id) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(
                format!("User {} is not a participant of the session", user_id),
                ErrorCode::UnknownParticipant.to_string(),
            )),
        )
            .into_response(),
        RelayError::Publish(e) => handle_publish_error(e),
    }
}

fn handle_sync_error(error: SyncError) -> Response {
    match error {
        SyncError::UnknownSession(id) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::not_found("Session", &id.to_string())),
        )
            .into_response(),
        SyncError::SessionExpired => (
            StatusCode::GONE,
            Json(ErrorResponse::new(
                "Session has expired",
                ErrorCode::SessionExpired.to_string(),
            )),
        )
            .into_response(),
        SyncError::UnknownParticipant(user_id) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(
                format!("User {} is not a participant of the session", user_id),
                ErrorCode::UnknownParticipant.to_string(),
            )),
        )
            .into_response(),
        SyncError::StoreUnavailable(msg) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new(msg, ErrorCode::StoreUnavailable.to_string())),
        )
            .into_response(),
        SyncError::Unavailable => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new(
                "Whiteboard update could neither be persisted nor delivered",
                ErrorCode::StoreUnavailable.to_string(),
            )),
        )
            .into_response(),
    }
}

fn handle_control_error(error: ControlError) -> Response {
    match error {
        ControlError::UnknownSession(id) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::not_found("Session", &id.to_string())),
        )
            .into_response(),
        ControlError::SessionExpired => (
            StatusCode::GONE,
            Json(ErrorResponse::new(
                "Session has expired",
                ErrorCode::SessionExpired.to_string(),
            )),
        )
            .into_response(),
        ControlError::Forbidden => (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse::forbidden(
                "Only the session's teacher may hand off control",
            )),
        )
            .into_response(),
        ControlError::UnknownParticipant(user_id) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(
                format!("User {} is not a participant of the session", user_id),
                ErrorCode::UnknownParticipant.to_string(),
            )),
        )
            .into_response(),
    }
}

fn handle_publish_error(error: PublishError) -> Response {
    let status = match &error {
        PublishError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        PublishError::Rejected(_) => StatusCode::BAD_GATEWAY,
        PublishError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse::new(error.to_string(), ErrorCode::BusUnavailable.to_string())),
    )
        .into_response()
}
