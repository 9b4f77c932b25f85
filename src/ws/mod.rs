//! WebSocket layer: admission, session loops, routing and fan-out.
//!
//! The endpoint at `/ws?otp=<token>` upgrades to a persistent connection
//! once the one-time token has been consumed. Each connection becomes a
//! [`Session`] with its own read loop, write loop and bounded egress queue,
//! tracked by the [`SessionRegistry`].

pub mod connection;
pub mod handler;
pub mod registry;
pub mod router;
pub mod session;

pub use connection::LoopExit;
pub use registry::SessionRegistry;
pub use router::{Dispatch, EventHandler, EventRouter};
pub use session::{Session, SessionSettings};
