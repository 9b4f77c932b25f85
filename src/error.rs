//! Hub error types with HTTP status code mapping.
//!
//! [`HubError`] is the central error type. Session-level failures (transport,
//! decode, routing, egress) never leave their session; only the admission
//! and login paths turn a `HubError` into an HTTP response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::domain::SessionId;

/// Structured JSON error response body.
///
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "transport error: connection reset"
///   }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
}

/// Hub error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category         | HTTP Status                |
/// |-----------|------------------|----------------------------|
/// | 1000–1999 | Auth / policy    | 401 Unauthorized / 403     |
/// | 2000–2999 | Transport        | 500 Internal Server Error  |
/// | 3000–3999 | Decode / routing | 400 Bad Request            |
/// | 4000–4999 | Egress delivery  | 503 Service Unavailable    |
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// Admission token missing, unknown, expired or already used.
    #[error("missing or invalid admission token")]
    Unauthorized,

    /// Login attempt did not match the bootstrap credentials.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Upgrade request came from an origin outside the allow-list.
    #[error("origin not allowed: {0}")]
    OriginRejected(String),

    /// Reading from or writing to the transport failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// No heartbeat response arrived before the read deadline.
    #[error("no heartbeat response within {0:?}")]
    HeartbeatTimeout(std::time::Duration),

    /// Inbound frame exceeded the size cap.
    #[error("frame of {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge {
        /// Size of the offending frame.
        size: usize,
        /// Configured maximum.
        limit: usize,
    },

    /// Inbound bytes did not parse into an event envelope.
    #[error("malformed event: {0}")]
    Decode(#[source] serde_json::Error),

    /// No handler is registered for the event type.
    #[error("no handler for event type: {0}")]
    UnknownEvent(String),

    /// A handler rejected the event payload.
    #[error("invalid payload for {event_type}: {reason}")]
    InvalidPayload {
        /// Event type whose payload was rejected.
        event_type: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An outbound event could not be serialized.
    #[error("failed to serialize outbound event: {0}")]
    Marshal(#[source] serde_json::Error),

    /// The session's egress queue is full; the event was dropped.
    #[error("egress queue full for session {0}")]
    EgressFull(SessionId),

    /// The session's egress queue has no consumer any more.
    #[error("egress queue closed for session {0}")]
    EgressClosed(SessionId),
}

impl HubError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Unauthorized => 1001,
            Self::InvalidCredentials => 1002,
            Self::OriginRejected(_) => 1003,
            Self::Transport(_) => 2001,
            Self::HeartbeatTimeout(_) => 2002,
            Self::FrameTooLarge { .. } => 2003,
            Self::Decode(_) => 3001,
            Self::UnknownEvent(_) => 3002,
            Self::InvalidPayload { .. } => 3003,
            Self::Marshal(_) => 3004,
            Self::EgressFull(_) => 4001,
            Self::EgressClosed(_) => 4002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::OriginRejected(_) => StatusCode::FORBIDDEN,
            Self::Decode(_) | Self::UnknownEvent(_) | Self::InvalidPayload { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::EgressFull(_) | Self::EgressClosed(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Transport(_)
            | Self::HeartbeatTimeout(_)
            | Self::FrameTooLarge { .. }
            | Self::Marshal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns `true` for errors that end the session that raised them.
    ///
    /// A payload that does not decode for a registered event type is as
    /// fatal as a malformed envelope. Unknown event types, marshal and
    /// egress errors are reported and the session carries on.
    #[must_use]
    pub const fn is_fatal_for_session(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::HeartbeatTimeout(_)
                | Self::FrameTooLarge { .. }
                | Self::Decode(_)
                | Self::InvalidPayload { .. }
        )
    }
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // 401 responses have an empty body.
        if status == StatusCode::UNAUTHORIZED {
            return status.into_response();
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
