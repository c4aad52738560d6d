//! Module directory
//!
//! `Directory` is the one value that owns the persistent `Layout`. It
//! exposes:
//!
//! - the immediate-write path (`set`, `set_batch`) and pure reads
//! - the timelocked path (`schedule`, `cancel`, `execute`,
//!   `emergency_cancel_all`)
//! - runtime key registration
//!
//! Governance and permit redemption are implemented in their own modules
//! as further `impl Directory` blocks over the same transaction machinery.
//!
//! # Invariants
//!
//! - Every mutation other than `initialize` requires the live layout
//!   version to equal the version the running logic expects
//! - Gates are checked in order: pause, version, authorization, input
//! - A failed call leaves the layout unchanged and emits nothing

mod config;
mod directory;
mod guard;
mod modules;
mod registrar;
mod scheduler;

pub use config::{derive_identity, DirectoryConfig};
pub use directory::{Collaborators, Directory, InitParams};
pub use guard::{GuardToken, ReentrancyGuard};
pub use modules::{BatchOutcome, SetOutcome};
pub use scheduler::{ExecuteOutcome, UpgradeState};

pub(crate) use directory::Txn;
pub(crate) use modules::{commit_batch, commit_single};
