//! Per-connection session state.
//!
//! A [`Session`] is the shared handle to one admitted connection: its id,
//! the producer side of its egress queue, and the close signal that stands
//! in for closing the transport. The transport halves themselves are owned
//! by the read and write loops in [`super::connection`].

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::{Event, SessionId};
use crate::error::HubError;

/// Timing and sizing applied to every session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Read deadline after the last heartbeat response.
    pub pong_wait: Duration,
    /// Maximum size of one inbound frame, in bytes.
    pub max_frame_bytes: usize,
    /// Bound of the egress queue.
    pub egress_capacity: usize,
}

impl SessionSettings {
    /// Heartbeat probe period: 90% of [`Self::pong_wait`], so a probe always
    /// goes out before the peer's read deadline.
    #[must_use]
    pub fn ping_interval(&self) -> Duration {
        self.pong_wait * 9 / 10
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            pong_wait: Duration::from_secs(10),
            max_frame_bytes: 512,
            egress_capacity: 256,
        }
    }
}

/// Shared handle to one admitted connection.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    egress: mpsc::Sender<Event>,
    closed: CancellationToken,
}

impl Session {
    /// Creates a session with a bounded egress queue of `capacity`.
    ///
    /// Returns the session and the consumer side of its queue, which belongs
    /// to the write loop.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (egress, rx) = mpsc::channel(capacity);
        let session = Self {
            id: SessionId::new(),
            egress,
            closed: CancellationToken::new(),
        };
        (session, rx)
    }

    /// Session identifier.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Queues `event` for the write loop without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::EgressFull`] if the queue is at capacity and
    /// [`HubError::EgressClosed`] if the write loop has gone away. The event
    /// is dropped in both cases.
    pub fn enqueue(&self, event: Event) -> Result<(), HubError> {
        self.egress.try_send(event).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => HubError::EgressFull(self.id),
            mpsc::error::TrySendError::Closed(_) => HubError::EgressClosed(self.id),
        })
    }

    /// Signals both loops to stop. Idempotent.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Returns `true` once [`Session::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the session has been closed.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }
}
