//! # sync-types
//!
//! Card model, state snapshot and wire format types for cardset-sync.
//!
//! This crate provides the foundational types used across all cardset-sync crates:
//! - [`CardId`], [`HandId`], [`CollectionId`], [`UpdateId`] - Identity types
//! - [`Card`] - Originals and their Duplicates
//! - [`CardSetState`] - The snapshot of one card set (cards, deck, hands)
//! - [`StateUpdate`] - Discrete, idempotent mutations
//! - [`Request`] / [`Response`] - Messages exchanged with the relay
//! - [`SyncError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod card;
mod error;
mod ids;
mod messages;
mod state;
mod update;

pub use card::{Card, DuplicateCard, OriginalCard};
pub use error::SyncError;
pub use ids::{CardId, CollectionId, HandId, UpdateId};
pub use messages::{Request, Response, Status};
pub use state::{
    CardSetState, CardSetSummary, Hand, HandInfo, Location, DEFAULT_HAND_NAME, DEFAULT_SET_NAME,
};
pub use update::{CardMove, Destination, Operation, ReorderTarget, StateUpdate};
