//! The persistent layout record

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{DirectoryError, DirectoryResult};
use crate::keys::DynamicKeyRegistry;
use crate::types::{Identifier, Identity, Key};

/// Default per-key history capacity
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// A queued change waiting out its timelock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingUpgrade {
    /// Identifier to commit on execution
    pub new_identifier: Identifier,
    /// Earliest unix time at which execution is allowed
    pub execute_after: u64,
    /// Who scheduled it
    pub proposer: Identity,
    /// The delay in force when it was scheduled
    pub delay_snapshot: u64,
}

/// One committed change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Previous identifier, null for a first registration
    pub old_identifier: Identifier,
    pub new_identifier: Identifier,
    pub timestamp: u64,
    /// Caller, or the recovered signer for permit-driven changes
    pub executor: Identity,
}

/// The directory's single persistent record.
///
/// Fields are public so an external migrator can rewrite them in place
/// during `Directory::migrate`; outside a migration, the layout is only
/// reachable mutably through `Directory`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    pub version: u64,
    pub primary_owner: Identity,
    pub pending_owner: Option<Identity>,
    pub emergency: Identity,
    /// Holder of the upgrade-capable role (migrations, logic installs)
    pub upgrader: Identity,
    pub paused: bool,
    pub min_delay: u64,
    pub history_capacity: usize,
    pub modules: BTreeMap<Key, Identifier>,
    pub pending: BTreeMap<Key, PendingUpgrade>,
    pub history: BTreeMap<Key, Vec<HistoryEntry>>,
    pub history_cursor: BTreeMap<Key, u64>,
    pub nonces: BTreeMap<Identity, u64>,
    #[serde(default)]
    pub dynamic_keys: DynamicKeyRegistry,
}

impl Layout {
    /// Fresh layout at `version`.
    pub fn new(
        version: u64,
        primary_owner: Identity,
        emergency: Identity,
        upgrader: Identity,
        min_delay: u64,
        history_capacity: usize,
    ) -> Self {
        Self {
            version,
            primary_owner,
            pending_owner: None,
            emergency,
            upgrader,
            paused: false,
            min_delay,
            history_capacity,
            modules: BTreeMap::new(),
            pending: BTreeMap::new(),
            history: BTreeMap::new(),
            history_cursor: BTreeMap::new(),
            nonces: BTreeMap::new(),
            dynamic_keys: DynamicKeyRegistry::new(),
        }
    }

    /// Committed identifier for `key`, if any.
    pub fn module(&self, key: &Key) -> Option<Identifier> {
        self.modules.get(key).copied().filter(|id| !id.is_zero())
    }

    /// Current permit counter for `signer`.
    pub fn nonce(&self, signer: &Identity) -> u64 {
        self.nonces.get(signer).copied().unwrap_or(0)
    }

    /// Structural integrity check.
    ///
    /// Run before and after a migrator touches the layout. It checks shape,
    /// not policy: a layout that passes can be operated on safely.
    pub fn check_integrity(&self) -> DirectoryResult<()> {
        let fail = |msg: String| Err(DirectoryError::IntegrityViolation(msg));

        if self.version == 0 {
            return fail("layout version is zero".to_string());
        }
        if self.primary_owner.is_zero() {
            return fail("primary owner is null".to_string());
        }
        if self.history_capacity == 0 {
            return fail("history capacity is zero".to_string());
        }

        for (key, id) in &self.modules {
            if id.is_zero() {
                return fail(format!("module {} maps to the null identifier", key));
            }
        }

        for (key, pending) in &self.pending {
            if pending.new_identifier.is_zero() {
                return fail(format!("pending upgrade for {} targets null", key));
            }
            if pending.execute_after < pending.delay_snapshot {
                return fail(format!(
                    "pending upgrade for {} ends before its own delay",
                    key
                ));
            }
        }

        for (key, entries) in &self.history {
            let cursor = match self.history_cursor.get(key) {
                Some(c) => *c,
                None => return fail(format!("history for {} has no cursor", key)),
            };
            let len = entries.len() as u64;
            if entries.len() > self.history_capacity {
                return fail(format!(
                    "history for {} holds {} entries, capacity {}",
                    key,
                    entries.len(),
                    self.history_capacity
                ));
            }
            if cursor < len || (cursor < self.history_capacity as u64 && cursor != len) {
                return fail(format!(
                    "history cursor {} for {} disagrees with {} entries",
                    cursor, key, len
                ));
            }
        }
        for (key, cursor) in &self.history_cursor {
            if *cursor > 0 && !self.history.contains_key(key) {
                return fail(format!("cursor for {} has no history", key));
            }
        }

        self.dynamic_keys
            .check_integrity()
            .map_err(DirectoryError::IntegrityViolation)
    }
}
