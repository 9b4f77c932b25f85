//! Type-safe session identifier.
//!
//! [`SessionId`] wraps a [`uuid::Uuid`] (v4) so session keys cannot be
//! confused with token keys or other UUIDs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for one admitted session.
///
/// Generated once per admission. Used as the key of the
/// [`crate::ws::SessionRegistry`] map, which is what makes registering the
/// same session twice impossible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    /// Creates a new random `SessionId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<uuid::Uuid> for SessionId {
    fn from(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }
}
