//! moduledir - a governance-controlled module directory
//!
//! A persistent mapping from symbolic keys to opaque endpoint identifiers,
//! wrapped in a safe-mutation protocol: authorized immediate writes,
//! timelocked upgrades, signature-based permits with replay protection,
//! versioned storage migration and a bounded per-key history.

pub mod cli;
pub mod directory;
pub mod env;
pub mod errors;
pub mod governance;
pub mod history;
pub mod keys;
pub mod observability;
pub mod permit;
pub mod store;
pub mod types;

pub use directory::{Collaborators, Directory, DirectoryConfig, InitParams};
pub use errors::{DirectoryError, DirectoryResult, ErrorClass};
pub use types::{Identifier, Identity, Key};
