//! Toolpick keeps a chat client's set of selected MCP tool servers consistent
//! across three independently-updating sources: the servers currently
//! available to a conversation, the servers declared as defaults for every
//! conversation, and whatever selection the user last committed.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the per-conversation selection records and the
//!   reconciliation rules: defaults join a selection unless the user
//!   explicitly removed them, and unavailable servers are pruned exactly once
//!   per conversation, only after availability has actually been fetched.
//! - [`persistence`] defines the storage boundary committed selections are
//!   written through, with an in-memory adapter and a TOML-file adapter.
//!
//! The store does no I/O or scheduling of its own; the host application pushes
//! selection changes, defaults updates, and availability snapshots into it and
//! reads the reconciled set back out for display and persistence.

pub mod core;
pub mod persistence;

pub use crate::core::selection::{InvalidSelection, SelectionStore};
pub use crate::core::snapshot::AvailabilitySnapshot;
pub use crate::persistence::{MemoryPersistence, SelectionPersistence};
