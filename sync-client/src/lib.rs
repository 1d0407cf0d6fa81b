//! # sync-client
//!
//! Client library for cardset-sync.
//!
//! This is the library a card set editor uses to stay in sync with the
//! shared store while working offline-first.
//!
//! ## Features
//!
//! - **Optimistic edits**: every edit applies to the working snapshot at once
//! - **Update log**: unacknowledged edits survive failed rounds and are
//!   resubmitted with the same ids
//! - **Three-way merge**: concurrent edits from other clients are merged
//!   against the last agreed snapshot
//! - **Transport Abstraction**: Pluggable transport layer (HTTP, mock)
//! - **Pure State Machine**: Uses sync-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use cardset_sync_client::{spawn, CardSetEditor, CardSetSession, HttpTransport, SessionConfig};
//!
//! let config = SessionConfig::new("http://localhost:8080", "my-set");
//! let transport = HttpTransport::new(config.relay_url())?;
//! let (handle, _task) = spawn(CardSetSession::new(config, transport));
//!
//! handle.submit_new_card().await?;
//! let mut snapshots = handle.watch();
//! snapshots.changed().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod editor;
pub mod runner;
pub mod scheduler;
pub mod session;
pub mod transport;

pub use editor::{CardSetEditor, EditBuilder};
pub use runner::{spawn, SessionHandle};
pub use scheduler::{Scheduler, Tick};
pub use session::{CardSetSession, ClientError, SessionConfig};
pub use transport::{HttpTransport, MockTransport, Transport, TransportError, CONTENT_TYPE};
