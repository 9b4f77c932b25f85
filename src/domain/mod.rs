//! Domain layer: identifiers, wire events, credentials and the token store.
//!
//! Nothing in here touches the network. The WebSocket layer (`ws`) builds
//! sessions on top of these types and the REST layer (`api`) issues tokens
//! through [`TokenStore`].

pub mod credentials;
pub mod event;
pub mod session_id;
pub mod token_store;

pub use credentials::Credentials;
pub use event::{Event, NewMessageEvent, SendMessageEvent};
pub use session_id::SessionId;
pub use token_store::{Token, TokenStore};
