//! Event routing table.
//!
//! [`EventRouter`] maps an event type tag to a plain handler function. A
//! handler runs on the originating session's read loop, so it must be quick
//! and must not wait on other sessions. Instead of writing to other sessions
//! itself it returns a [`Dispatch`] describing what should happen next, and
//! the [`super::SessionRegistry`] carries that out.

use std::collections::HashMap;
use std::fmt;

use crate::domain::event::{EVENT_NEW_MESSAGE, EVENT_SEND_MESSAGE};
use crate::domain::{Event, NewMessageEvent, SendMessageEvent};
use crate::error::HubError;

use super::session::Session;

/// What the registry should do with a handler's result.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Queue the event on every registered session.
    Broadcast(Event),
    /// Nothing to deliver.
    Done,
}

/// Handler for one event type.
///
/// Receives the inbound event and the session it arrived on.
pub type EventHandler = fn(&Event, &Session) -> Result<Dispatch, HubError>;

/// Static table of event handlers, keyed by event type.
#[derive(Clone, Default)]
pub struct EventRouter {
    handlers: HashMap<String, EventHandler>,
}

impl EventRouter {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a router with the built-in chat handlers installed.
    #[must_use]
    pub fn with_default_handlers() -> Self {
        let mut router = Self::new();
        router.register(EVENT_SEND_MESSAGE, send_message);
        router
    }

    /// Installs `handler` for `event_type`, replacing any previous one.
    pub fn register(&mut self, event_type: impl Into<String>, handler: EventHandler) {
        self.handlers.insert(event_type.into(), handler);
    }

    /// Runs the handler registered for `event.event_type`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::UnknownEvent`] if no handler is registered, or
    /// whatever error the handler itself reports.
    pub fn dispatch(&self, event: &Event, origin: &Session) -> Result<Dispatch, HubError> {
        let handler = self
            .handlers
            .get(&event.event_type)
            .ok_or_else(|| HubError::UnknownEvent(event.event_type.clone()))?;
        handler(event, origin)
    }
}

impl fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        f.debug_struct("EventRouter")
            .field("event_types", &types)
            .finish()
    }
}

/// Built-in `send_message` handler: stamps the chat message and broadcasts
/// it as `new_message`.
///
/// # Errors
///
/// Returns [`HubError::InvalidPayload`] if the payload is not a
/// `{message, from}` object, and [`HubError::Marshal`] if the outbound
/// payload cannot be serialized.
pub fn send_message(event: &Event, origin: &Session) -> Result<Dispatch, HubError> {
    let inbound: SendMessageEvent =
        event.decode_payload().map_err(|err| HubError::InvalidPayload {
            event_type: event.event_type.clone(),
            reason: err.to_string(),
        })?;

    tracing::debug!(session_id = %origin.id(), from = %inbound.from, "chat message received");

    let outbound = Event::new(EVENT_NEW_MESSAGE, &NewMessageEvent::stamped(inbound))
        .map_err(HubError::Marshal)?;
    Ok(Dispatch::Broadcast(outbound))
}
