//! Identity types for cardset-sync.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $debug:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new random identifier (UUID v4 text).
            pub fn random() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($debug, "({})"), self.0)
            }
        }
    };
}

string_id!(
    /// Identifier of a card (Original or Duplicate).
    CardId,
    "CardId"
);

string_id!(
    /// Identifier of a hand.
    HandId,
    "HandId"
);

string_id!(
    /// Identifier of a card set document in the remote store.
    CollectionId,
    "CollectionId"
);

impl CardId {
    /// Deterministic id for the `ordinal`-th duplicate synthesized by `update`.
    ///
    /// Every replica applying the same update derives the same ids.
    pub fn synthesized(update: &UpdateId, ordinal: usize) -> Self {
        Self(format!("{}/{}", update, ordinal))
    }
}

impl HandId {
    /// Id of the hand every fresh card set starts with.
    pub fn default_hand() -> Self {
        Self("default".to_string())
    }
}

/// Caller-assigned, globally unique identifier of a [`StateUpdate`].
///
/// UUID v4 format (16 bytes). Used for idempotent replay and for
/// acknowledgement-based log trimming.
///
/// [`StateUpdate`]: crate::StateUpdate
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UpdateId(uuid::Uuid);

impl UpdateId {
    /// Create a new random UpdateId.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Create an UpdateId from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        uuid::Uuid::from_slice(bytes).ok().map(Self)
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for UpdateId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UpdateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for UpdateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UpdateId({})", self.0)
    }
}
