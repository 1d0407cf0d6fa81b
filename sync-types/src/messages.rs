//! Request/response messages exchanged between a client session and the relay.

use serde::{Deserialize, Serialize};

use crate::{CardSetState, CardSetSummary, CollectionId, StateUpdate, SyncError};

/// Outcome marker carried by responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// The request was handled.
    Ok,
    /// The request could not be handled.
    Failed,
}

/// A client request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Apply a batch of updates and return the resulting snapshot.
    Submit {
        /// Target card set.
        collection: CollectionId,
        /// Updates, in submission order. May be empty.
        updates: Vec<StateUpdate>,
    },
    /// Return the current snapshot without mutating it.
    Fetch {
        /// Target card set.
        collection: CollectionId,
    },
    /// List every stored card set.
    ListCardSets,
}

/// A relay response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Authoritative snapshot after a submit or fetch.
    Snapshot {
        /// Whether the request succeeded.
        status: Status,
        /// The snapshot, absent on failure.
        snapshot: Option<CardSetState>,
    },
    /// Stored card sets.
    CardSets {
        /// `{id, name}` of each set.
        sets: Vec<CardSetSummary>,
    },
    /// The request failed.
    Error {
        /// Always [`Status::Failed`].
        status: Status,
        /// Human-readable reason.
        message: String,
    },
}

impl Response {
    /// A successful snapshot response.
    pub fn snapshot(state: CardSetState) -> Self {
        Response::Snapshot {
            status: Status::Ok,
            snapshot: Some(state),
        }
    }

    /// A failure response.
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            status: Status::Failed,
            message: message.into(),
        }
    }
}

macro_rules! msgpack_codec {
    ($ty:ty) => {
        impl $ty {
            /// Serialize to MessagePack bytes (named fields).
            pub fn to_bytes(&self) -> Result<Vec<u8>, SyncError> {
                rmp_serde::to_vec_named(self).map_err(SyncError::Serialization)
            }

            /// Deserialize from MessagePack bytes.
            pub fn from_bytes(bytes: &[u8]) -> Result<Self, SyncError> {
                rmp_serde::from_slice(bytes).map_err(SyncError::Deserialization)
            }
        }
    };
}

msgpack_codec!(Request);
msgpack_codec!(Response);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Destination, OriginalCard};

    #[test]
    fn submit_roundtrip() {
        let request = Request::Submit {
            collection: CollectionId::from("set"),
            updates: vec![
                StateUpdate::add_card(OriginalCard::new("c1", "X").with_duplication(2)),
                StateUpdate::move_card("c1", Destination::hand("default", 0)),
            ],
        };

        let bytes = request.to_bytes().unwrap();
        let restored = Request::from_bytes(&bytes).unwrap();

        assert_eq!(request, restored);
    }

    #[test]
    fn snapshot_response_roundtrip() {
        let response = Response::snapshot(CardSetState::new(CollectionId::from("set")));

        let bytes = response.to_bytes().unwrap();
        let restored = Response::from_bytes(&bytes).unwrap();

        assert_eq!(response, restored);
    }

    #[test]
    fn error_response_is_failed() {
        let response = Response::error("boom");
        assert!(matches!(
            response,
            Response::Error {
                status: Status::Failed,
                ..
            }
        ));
    }

    #[test]
    fn garbage_fails_to_decode() {
        let result = Request::from_bytes(&[0xc1, 0x00]);
        assert!(matches!(result, Err(SyncError::Deserialization(_))));
    }
}
