//! # chat-hub
//!
//! Real-time chat hub over WebSocket.
//!
//! Clients log in with the bootstrap credentials to obtain a one-time
//! token, then open `/ws?otp=<token>`. Every admitted connection becomes a
//! session with its own read loop, write loop and bounded egress queue.
//! Chat messages sent by any session are stamped and broadcast to all of
//! them. Heartbeat pings detect dead peers, and expired tokens are swept
//! in the background.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)       POST /login, GET /health
//!     ├── WS Handler (ws/handler)    GET /ws?otp=…
//!     │
//!     ├── SessionRegistry (ws/)      admit · evict · route · broadcast
//!     │     ├── EventRouter          event type → handler
//!     │     └── Session loops        read (deadline) / write (ping, egress)
//!     │
//!     └── TokenStore (domain/)       issue · verify · retention sweep
//! ```

pub mod api;
pub mod app;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod ws;
