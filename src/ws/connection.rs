//! Read and write loops for a single session.
//!
//! The transport is split once: the read loop is its only reader and the
//! write loop its only writer. The read loop enforces the heartbeat read
//! deadline and the frame size cap, decodes events and routes them. The
//! write loop drains the session's egress queue and sends a ping every
//! [`SessionSettings::ping_interval`](super::SessionSettings::ping_interval).
//! Whichever loop stops first evicts the session, which closes it and
//! stops the other loop.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};

use super::registry::SessionRegistry;
use super::session::Session;
use crate::domain::{Event, SessionId};
use crate::error::HubError;

/// Upper bound on sending the close frame when the write loop stops.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Why a session loop stopped.
#[derive(Debug)]
pub enum LoopExit {
    /// The peer sent a close frame or the inbound stream ended.
    PeerClosed,
    /// The session was evicted while the loop was waiting.
    Evicted,
    /// Every producer of the egress queue went away.
    ///
    /// A registered [`Session`] holds the producer for as long as its write
    /// loop holds the session, so only a loop driven with a queue detached
    /// from its session stops this way.
    QueueClosed,
    /// The loop hit a fatal error.
    Failed(HubError),
}

/// Reads frames until the transport fails, the peer closes, or the session
/// is evicted, then evicts the session.
///
/// - A pong pushes the read deadline to now + `pong_wait`.
/// - A frame larger than `max_frame_bytes` or one that is not an [`Event`]
///   ends the loop.
/// - A payload that does not fit the handler's schema ends the loop. Other
///   routing errors are logged and reading continues.
pub async fn read_loop<R, E>(
    mut stream: R,
    session: Arc<Session>,
    registry: Arc<SessionRegistry>,
) -> LoopExit
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    let settings = *registry.settings();
    let mut deadline = Instant::now() + settings.pong_wait;

    let exit = loop {
        let next = tokio::select! {
            () = session.closed() => break LoopExit::Evicted,
            next = time::timeout_at(deadline, stream.next()) => next,
        };

        let message = match next {
            Err(_elapsed) => {
                break LoopExit::Failed(HubError::HeartbeatTimeout(settings.pong_wait));
            }
            Ok(None) => break LoopExit::PeerClosed,
            Ok(Some(Err(err))) => break LoopExit::Failed(HubError::Transport(err.to_string())),
            Ok(Some(Ok(message))) => message,
        };

        let payload: &[u8] = match &message {
            Message::Text(text) => text.as_str().as_bytes(),
            Message::Binary(bytes) => bytes.as_ref(),
            Message::Pong(_) => {
                deadline = Instant::now() + settings.pong_wait;
                tracing::trace!(session_id = %session.id(), "pong");
                continue;
            }
            Message::Ping(_) => continue,
            Message::Close(_) => break LoopExit::PeerClosed,
        };

        if payload.len() > settings.max_frame_bytes {
            break LoopExit::Failed(HubError::FrameTooLarge {
                size: payload.len(),
                limit: settings.max_frame_bytes,
            });
        }

        let event: Event = match serde_json::from_slice(payload) {
            Ok(event) => event,
            Err(err) => break LoopExit::Failed(HubError::Decode(err)),
        };

        if let Err(err) = registry.route(&event, &session).await {
            if err.is_fatal_for_session() {
                break LoopExit::Failed(err);
            }
            tracing::warn!(
                session_id = %session.id(),
                event_type = %event.event_type,
                error = %err,
                "failed to route event"
            );
        }
    };

    log_exit("read", session.id(), &exit);
    registry.evict(session.id()).await;
    exit
}

/// Sends queued events and heartbeat pings until a send fails, the queue
/// closes, or the session is evicted, then evicts the session and closes
/// the sink.
///
/// Eviction also interrupts a send the peer is not draining. An event that
/// fails to serialize is skipped.
pub async fn write_loop<W>(
    mut sink: W,
    mut egress: mpsc::Receiver<Event>,
    session: Arc<Session>,
    registry: Arc<SessionRegistry>,
) -> LoopExit
where
    W: Sink<Message> + Unpin,
    W::Error: fmt::Display,
{
    let period = registry.settings().ping_interval();
    let mut heartbeat = time::interval_at(Instant::now() + period, period);

    let exit = loop {
        tokio::select! {
            () = session.closed() => break LoopExit::Evicted,
            next = egress.recv() => {
                let Some(event) = next else {
                    break LoopExit::QueueClosed;
                };
                let json = match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(err) => {
                        tracing::warn!(
                            session_id = %session.id(),
                            error = %HubError::Marshal(err),
                            "skipped outbound event"
                        );
                        continue;
                    }
                };
                if let Some(exit) = deliver(&mut sink, Message::text(json), &session).await {
                    break exit;
                }
                tracing::trace!(session_id = %session.id(), "message sent");
            }
            _ = heartbeat.tick() => {
                let ping = Message::Ping(Bytes::new());
                if let Some(exit) = deliver(&mut sink, ping, &session).await {
                    break exit;
                }
                tracing::trace!(session_id = %session.id(), "ping sent");
            }
        }
    };

    log_exit("write", session.id(), &exit);
    registry.evict(session.id()).await;
    let _ = time::timeout(CLOSE_TIMEOUT, sink.close()).await;
    exit
}

/// Sends one frame, giving up as soon as the session is closed.
///
/// Returns the exit reason if the write loop must stop.
async fn deliver<W>(sink: &mut W, message: Message, session: &Session) -> Option<LoopExit>
where
    W: Sink<Message> + Unpin,
    W::Error: fmt::Display,
{
    tokio::select! {
        () = session.closed() => Some(LoopExit::Evicted),
        sent = sink.send(message) => sent
            .err()
            .map(|err| LoopExit::Failed(HubError::Transport(err.to_string()))),
    }
}

fn log_exit(direction: &'static str, id: SessionId, exit: &LoopExit) {
    match exit {
        LoopExit::Failed(err) => {
            tracing::warn!(session_id = %id, direction, error = %err, "session loop failed");
        }
        other => {
            tracing::debug!(session_id = %id, direction, reason = ?other, "session loop stopped");
        }
    }
}
