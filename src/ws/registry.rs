//! Registry of active sessions.
//!
//! [`SessionRegistry`] owns the set of live sessions behind a
//! [`tokio::sync::RwLock`]. It is the only way in and out of that set:
//! admission checks the one-time token before anything is upgraded,
//! eviction removes a session and closes it exactly once, and routing runs
//! event handlers and fans their broadcasts out to every session's egress
//! queue.
//!
//! # Concurrency
//!
//! - Register, evict and close-all take the write lock.
//! - Broadcasts take a snapshot under the read lock, release it, then
//!   `try_send` to each recipient, so a slow or dead session never stalls
//!   the sender's read loop.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{Sink, Stream, StreamExt};
use tokio::sync::RwLock;

use super::connection::{read_loop, write_loop};
use super::router::{Dispatch, EventRouter};
use super::session::{Session, SessionSettings};
use crate::domain::{Event, SessionId, TokenStore};
use crate::error::HubError;

/// Set of active sessions plus the collaborators needed to admit and route.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    tokens: TokenStore,
    router: EventRouter,
    settings: SessionSettings,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(tokens: TokenStore, router: EventRouter, settings: SessionSettings) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            tokens,
            router,
            settings,
        }
    }

    /// Token store consulted on admission.
    #[must_use]
    pub const fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Settings applied to every admitted session.
    #[must_use]
    pub const fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Admits a connection: consumes `token`, then upgrades the request and
    /// starts the session once the handshake completes.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Unauthorized`] if the token is missing, unknown,
    /// expired or already used. No upgrade is performed in that case.
    pub async fn admit(
        self: &Arc<Self>,
        token: Option<&str>,
        upgrade: WebSocketUpgrade,
    ) -> Result<Response, HubError> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            tracing::debug!("upgrade rejected: no token");
            return Err(HubError::Unauthorized);
        };
        if !self.tokens.verify(token).await {
            tracing::debug!("upgrade rejected: invalid token");
            return Err(HubError::Unauthorized);
        }

        let registry = Arc::clone(self);
        let limit = self.settings.max_frame_bytes;
        Ok(upgrade
            .max_frame_size(limit)
            .max_message_size(limit)
            .on_failed_upgrade(|err: axum::Error| {
                tracing::warn!(error = %err, "websocket upgrade failed");
            })
            .on_upgrade(move |socket| async move {
                let (sink, stream) = socket.split();
                registry.start_session(stream, sink).await;
            }))
    }

    /// Registers a new session over an upgraded transport and spawns its
    /// read and write loops.
    pub async fn start_session<R, E, W>(self: &Arc<Self>, stream: R, sink: W) -> SessionId
    where
        R: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
        E: fmt::Display + Send + 'static,
        W: Sink<Message> + Unpin + Send + 'static,
        W::Error: fmt::Display + Send,
    {
        let (session, egress) = Session::new(self.settings.egress_capacity);
        let session = Arc::new(session);
        let id = session.id();

        self.register(Arc::clone(&session)).await;
        tokio::spawn(read_loop(stream, Arc::clone(&session), Arc::clone(self)));
        tokio::spawn(write_loop(sink, egress, session, Arc::clone(self)));

        tracing::info!(session_id = %id, "session admitted");
        id
    }

    /// Adds `session` to the active set.
    pub async fn register(&self, session: Arc<Session>) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id(), session);
    }

    /// Removes the session and closes it.
    ///
    /// Returns `true` if this call removed it; evicting an absent session
    /// is a no-op that returns `false`.
    pub async fn evict(&self, id: SessionId) -> bool {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.remove(&id) else {
            return false;
        };
        session.close();
        let remaining = sessions.len();
        drop(sessions);

        tracing::info!(session_id = %id, remaining, "session evicted");
        true
    }

    /// Routes an inbound event through the handler table and applies the
    /// handler's [`Dispatch`].
    ///
    /// Returns the number of sessions the resulting broadcast reached.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::UnknownEvent`] for an unregistered event type, or
    /// the handler's own error. The caller logs it and keeps reading.
    pub async fn route(&self, event: &Event, origin: &Session) -> Result<usize, HubError> {
        match self.router.dispatch(event, origin)? {
            Dispatch::Broadcast(outbound) => Ok(self.broadcast(outbound).await),
            Dispatch::Done => Ok(0),
        }
    }

    /// Queues `event` on every currently registered session.
    ///
    /// Full queues drop the event for that session only. Returns the number
    /// of sessions the event was queued on.
    pub async fn broadcast(&self, event: Event) -> usize {
        let recipients: Vec<Arc<Session>> =
            self.sessions.read().await.values().map(Arc::clone).collect();

        let mut delivered = 0;
        for session in &recipients {
            match session.enqueue(event.clone()) {
                Ok(()) => delivered += 1,
                Err(err @ HubError::EgressFull(_)) => {
                    tracing::warn!(session_id = %session.id(), error = %err, "dropped broadcast for slow session");
                }
                Err(err) => {
                    tracing::debug!(session_id = %session.id(), error = %err, "skipped closing session");
                }
            }
        }

        tracing::debug!(
            event_type = %event.event_type,
            recipients = recipients.len(),
            delivered,
            "broadcast event"
        );
        delivered
    }

    /// Returns `true` if the session is registered.
    pub async fn contains(&self, id: SessionId) -> bool {
        self.sessions.read().await.contains_key(&id)
    }

    /// Number of active sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns `true` if no sessions are active.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Evicts every session. Used on shutdown.
    ///
    /// Returns the number of sessions closed.
    pub async fn close_all(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len();
        for (_, session) in sessions.drain() {
            session.close();
        }
        count
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::domain::event::{EVENT_NEW_MESSAGE, EVENT_SEND_MESSAGE};
    use crate::domain::NewMessageEvent;

    fn make_registry() -> SessionRegistry {
        SessionRegistry::new(
            TokenStore::new(Duration::from_secs(5)),
            EventRouter::with_default_handlers(),
            SessionSettings::default(),
        )
    }

    async fn join(
        registry: &SessionRegistry,
        capacity: usize,
    ) -> (Arc<Session>, tokio::sync::mpsc::Receiver<Event>) {
        let (session, rx) = Session::new(capacity);
        let session = Arc::new(session);
        registry.register(Arc::clone(&session)).await;
        (session, rx)
    }

    fn chat(message: &str, from: &str) -> Event {
        Event {
            event_type: EVENT_SEND_MESSAGE.to_string(),
            payload: serde_json::json!({ "message": message, "from": from }),
        }
    }

    #[tokio::test]
    async fn evict_closes_once_and_is_idempotent() {
        let registry = make_registry();
        let (session, _rx) = join(&registry, 4).await;
        assert_eq!(registry.len().await, 1);

        assert!(registry.evict(session.id()).await);
        assert!(session.is_closed());
        assert!(!registry.evict(session.id()).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn evicting_unknown_session_is_noop() {
        let registry = make_registry();
        let (_session, _rx) = join(&registry, 4).await;

        assert!(!registry.evict(SessionId::new()).await);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn broadcast_reaches_each_session_exactly_once() {
        let registry = make_registry();
        let mut receivers = Vec::new();
        for _ in 0..3 {
            receivers.push(join(&registry, 8).await);
        }

        let event = Event {
            event_type: EVENT_NEW_MESSAGE.to_string(),
            payload: serde_json::json!({}),
        };
        assert_eq!(registry.broadcast(event.clone()).await, 3);

        for (_, rx) in &mut receivers {
            assert_eq!(rx.try_recv().ok(), Some(event.clone()));
            assert!(rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn full_queue_does_not_block_other_recipients() {
        let registry = make_registry();
        let (slow, _slow_rx) = join(&registry, 1).await;
        let (_fast, mut fast_rx) = join(&registry, 8).await;

        assert!(slow.enqueue(chat("backlog", "x")).is_ok());

        let delivered =
            tokio::time::timeout(Duration::from_secs(1), registry.broadcast(chat("hi", "A"))).await;
        assert_eq!(delivered.ok(), Some(1));
        assert!(fast_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn route_send_message_fans_out_new_message() {
        let registry = make_registry();
        let (a, mut a_rx) = join(&registry, 8).await;
        let (_b, mut b_rx) = join(&registry, 8).await;

        let Ok(delivered) = registry.route(&chat("hi", "A"), &a).await else {
            panic!("send_message must route");
        };
        assert_eq!(delivered, 2);

        for rx in [&mut a_rx, &mut b_rx] {
            let Ok(out) = rx.try_recv() else {
                panic!("each session receives the broadcast");
            };
            assert_eq!(out.event_type, EVENT_NEW_MESSAGE);
            let Ok(payload) = out.decode_payload::<NewMessageEvent>() else {
                panic!("new_message payload");
            };
            assert_eq!(payload.message, "hi");
            assert_eq!(payload.from, "A");
        }
    }

    #[tokio::test]
    async fn route_unknown_event_delivers_nothing() {
        let registry = make_registry();
        let (a, mut a_rx) = join(&registry, 8).await;
        let event = Event {
            event_type: "unknown_type".to_string(),
            payload: serde_json::json!({}),
        };

        let result = registry.route(&event, &a).await;
        assert!(matches!(result, Err(HubError::UnknownEvent(_))));
        assert!(a_rx.try_recv().is_err());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn evicted_session_misses_later_broadcasts() {
        let registry = make_registry();
        let (a, mut a_rx) = join(&registry, 8).await;
        let (_b, mut b_rx) = join(&registry, 8).await;

        registry.evict(a.id()).await;
        assert_eq!(registry.broadcast(chat("hi", "B")).await, 1);
        assert!(a_rx.try_recv().is_err());
        assert!(b_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn close_all_closes_every_session() {
        let registry = make_registry();
        let (a, _a_rx) = join(&registry, 1).await;
        let (b, _b_rx) = join(&registry, 1).await;

        assert_eq!(registry.close_all().await, 2);
        assert!(a.is_closed());
        assert!(b.is_closed());
        assert!(registry.is_empty().await);
    }
}
