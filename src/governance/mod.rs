//! Governance
//!
//! Meta-permissions over the directory:
//!
//! - two-step primary-owner transfer, plus direct reassignment that drops
//!   any pending nomination
//! - an emergency role whose powers stay available while paused: pause,
//!   cancel pending upgrades, take over the upgrade-capable role
//! - the global pause gate
//! - versioned storage migration through an external `Migrator`
//!
//! Role decisions beyond owner/emergency/upgrader come from an injected
//! `AccessControl`.

mod access;
mod admin;
mod migration;

pub use access::{AccessControl, DenyAll, Role, StaticAccessControl};
pub use admin::GovernanceState;
pub use migration::{Migrator, NoopMigrator};
