//! Wire events exchanged over a session.
//!
//! Every frame in either direction is an [`Event`] envelope:
//!
//! ```json
//! { "type": "send_message", "payload": { "message": "hi", "from": "percy" } }
//! ```
//!
//! The payload stays an untyped JSON value until a handler decodes it into
//! the schema registered for that event type.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Inbound event type: a client posts a chat message.
pub const EVENT_SEND_MESSAGE: &str = "send_message";

/// Outbound event type: a chat message broadcast to every session.
pub const EVENT_NEW_MESSAGE: &str = "new_message";

/// Top-level event envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event type tag used by the router.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Raw payload, decoded lazily by the handler for `event_type`.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Event {
    /// Builds an event by serializing `payload` into the envelope.
    ///
    /// # Errors
    ///
    /// Returns the [`serde_json::Error`] if `payload` cannot be represented
    /// as JSON.
    pub fn new<T: Serialize>(
        event_type: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event_type: event_type.into(),
            payload: serde_json::to_value(payload)?,
        })
    }

    /// Decodes the payload into the schema `T`.
    ///
    /// # Errors
    ///
    /// Returns the [`serde_json::Error`] if the payload does not match `T`.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }
}

/// Payload of an inbound [`EVENT_SEND_MESSAGE`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageEvent {
    /// Message body.
    pub message: String,
    /// Display name of the sender.
    pub from: String,
}

/// Payload of an outbound [`EVENT_NEW_MESSAGE`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessageEvent {
    /// Message body.
    pub message: String,
    /// Display name of the sender.
    pub from: String,
    /// Server time at which the message was accepted for broadcast.
    pub sent: DateTime<Utc>,
}

impl NewMessageEvent {
    /// Stamps an inbound chat message with the current server time.
    #[must_use]
    pub fn stamped(inbound: SendMessageEvent) -> Self {
        Self {
            message: inbound.message,
            from: inbound.from,
            sent: Utc::now(),
        }
    }
}
