//! Versioned store
//!
//! The directory keeps exactly one persistent record, the `Layout`. It holds
//! the layout-version tag, the key → identifier map, pending upgrades,
//! bounded per-key history, per-signer nonces and the dynamic key registry.
//!
//! # Invariants
//!
//! - `version` is never zero once initialized
//! - every mutation except initialization requires `version` to equal the
//!   version the running logic expects (checked by `Directory`)
//! - `version` only changes through `Directory::migrate`
//! - the layout is persisted at one fixed path per data directory

mod checksum;
mod layout;
mod snapshot;

pub use checksum::{compute_checksum, verify_checksum};
pub use layout::{HistoryEntry, Layout, PendingUpgrade, DEFAULT_HISTORY_CAPACITY};
pub use snapshot::{LayoutStore, LAYOUT_FILE_NAME};
