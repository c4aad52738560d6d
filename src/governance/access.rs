//! Access authorization collaborator
//!
//! The directory never computes permissions. It asks an injected
//! `AccessControl` for yes/no role decisions and turns a "no" into
//! `MissingRole`. Ownership and the emergency role are checked against the
//! layout directly; everything else goes through this trait.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{DirectoryError, DirectoryResult};
use crate::types::Identity;

/// Actions gated by an external role decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Write module entries, schedule and execute upgrades, sign permits
    DirectoryAdmin,
    /// Mint dynamic keys
    KeyRegistrar,
    /// Revoke dynamic keys
    SystemAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::DirectoryAdmin => "DIRECTORY_ADMIN",
            Role::KeyRegistrar => "KEY_REGISTRAR",
            Role::SystemAdmin => "SYSTEM_ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Yes/no role decisions.
pub trait AccessControl: Send + Sync {
    fn has_role(&self, role: Role, identity: &Identity) -> bool;

    fn require_role(&self, role: Role, identity: &Identity) -> DirectoryResult<()> {
        if self.has_role(role, identity) {
            Ok(())
        } else {
            Err(DirectoryError::missing_role(role.as_str(), *identity))
        }
    }
}

/// Fixed grant table.
#[derive(Debug, Clone, Default)]
pub struct StaticAccessControl {
    grants: BTreeMap<Role, BTreeSet<Identity>>,
}

impl StaticAccessControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, role: Role, identity: Identity) -> Self {
        self.grants.entry(role).or_default().insert(identity);
        self
    }

    pub fn grant_all(mut self, role: Role, identities: impl IntoIterator<Item = Identity>) -> Self {
        self.grants.entry(role).or_default().extend(identities);
        self
    }

    pub fn holders(&self, role: Role) -> Vec<Identity> {
        self.grants
            .get(&role)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl AccessControl for StaticAccessControl {
    fn has_role(&self, role: Role, identity: &Identity) -> bool {
        self.grants
            .get(&role)
            .map(|set| set.contains(identity))
            .unwrap_or(false)
    }
}

/// Denies every role.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl AccessControl for DenyAll {
    fn has_role(&self, _role: Role, _identity: &Identity) -> bool {
        false
    }
}
