//! Timelocked upgrades
//!
//! Per-key state machine:
//!
//! ```text
//! Absent --schedule--> Scheduled --(now >= execute_after)--> Ready
//!    ^                     |                                   |
//!    +-------cancel--------+-------------execute---------------+
//! ```
//!
//! A pending upgrade freezes the delay that applied when it was proposed;
//! later `set_min_delay` calls do not move its `execute_after`. A ready
//! upgrade stays executable until it is cancelled or superseded.

use serde::Serialize;

use super::directory::Directory;
use super::modules::record_history;
use crate::errors::{DirectoryError, DirectoryResult};
use crate::history::HistoryLedger;
use crate::keys::{fixed_keys, FIXED_KEY_NAMES};
use crate::observability::DirectoryEvent;
use crate::store::PendingUpgrade;
use crate::types::{Identifier, Identity, Key};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpgradeState {
    Absent,
    Scheduled,
    Ready,
}

impl UpgradeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpgradeState::Absent => "ABSENT",
            UpgradeState::Scheduled => "SCHEDULED",
            UpgradeState::Ready => "READY",
        }
    }
}

/// Result of `execute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExecuteOutcome {
    pub old: Option<Identifier>,
    pub new: Identifier,
    pub changed: bool,
}

impl Directory {
    /// Queue `new_identifier` for `key`, replacing any earlier proposal.
    pub fn schedule(
        &mut self,
        caller: Identity,
        key: Key,
        new_identifier: Identifier,
    ) -> DirectoryResult<PendingUpgrade> {
        self.transact("schedule", |txn| {
            txn.admin_gate(&caller)?;
            if new_identifier.is_zero() {
                return Err(DirectoryError::InvalidIdentifier);
            }

            let delay = txn.layout.min_delay;
            let execute_after = txn.now.checked_add(delay).ok_or(DirectoryError::Overflow)?;
            let pending = PendingUpgrade {
                new_identifier,
                execute_after,
                proposer: caller,
                delay_snapshot: delay,
            };
            let replaced = txn
                .layout
                .pending
                .insert(key, pending)
                .map(|p| p.new_identifier);

            txn.emit(DirectoryEvent::UpgradeScheduled {
                key,
                new_identifier,
                execute_after,
                delay,
                proposer: caller,
                replaced,
                timestamp: txn.now,
            });
            Ok(pending)
        })
    }

    /// Drop the pending upgrade for `key`. Works while paused.
    ///
    /// Returns the cancelled proposal, or `None` if nothing was pending.
    pub fn cancel(&mut self, caller: Identity, key: Key) -> DirectoryResult<Option<PendingUpgrade>> {
        self.transact("cancel", |txn| {
            txn.require_version()?;
            txn.require_owner_or_emergency(&caller)?;

            let removed = txn.layout.pending.remove(&key);
            if let Some(pending) = removed {
                txn.emit(DirectoryEvent::UpgradeCancelled {
                    key,
                    identifier: pending.new_identifier,
                    by: caller,
                    timestamp: txn.now,
                });
            }
            Ok(removed)
        })
    }

    /// Commit a ready upgrade.
    pub fn execute(&mut self, caller: Identity, key: Key) -> DirectoryResult<ExecuteOutcome> {
        self.transact("execute", |txn| {
            txn.admin_gate(&caller)?;

            let pending = txn
                .layout
                .pending
                .get(&key)
                .copied()
                .ok_or_else(|| DirectoryError::NotFound(format!("pending upgrade for {}", key)))?;
            if txn.now < pending.execute_after {
                return Err(DirectoryError::NotReady {
                    execute_after: pending.execute_after,
                    now: txn.now,
                });
            }

            txn.layout.pending.remove(&key);
            let old = txn.layout.module(&key);
            let new = pending.new_identifier;
            let changed = old != Some(new);

            if changed {
                let old_id = old.unwrap_or_else(Identifier::zero);
                txn.layout.modules.insert(key, new);
                let slot = record_history(txn, key, old_id, new, caller);
                txn.emit(DirectoryEvent::HistoryRecorded {
                    key,
                    slot,
                    cursor: HistoryLedger::cursor(&txn.layout, &key),
                    executor: caller,
                    timestamp: txn.now,
                });
            }
            txn.emit(DirectoryEvent::UpgradeExecuted {
                key,
                old: old.unwrap_or_else(Identifier::zero),
                new,
                changed,
                executor: caller,
                timestamp: txn.now,
            });

            Ok(ExecuteOutcome { old, new, changed })
        })
    }

    /// Clear every pending upgrade across the known vocabulary.
    ///
    /// Emergency role only, available while paused. Returns the keys whose
    /// proposals were dropped.
    pub fn emergency_cancel_all(&mut self, caller: Identity) -> DirectoryResult<Vec<Key>> {
        self.transact("emergency_cancel_all", |txn| {
            txn.require_version()?;
            txn.require_emergency(&caller)?;

            let vocabulary: Vec<Key> = fixed_keys()
                .into_iter()
                .map(|(_, key)| key)
                .chain(txn.layout.dynamic_keys.keys())
                .collect();

            let mut cancelled = Vec::new();
            for key in vocabulary {
                if let Some(pending) = txn.layout.pending.remove(&key) {
                    txn.emit(DirectoryEvent::UpgradeCancelled {
                        key,
                        identifier: pending.new_identifier,
                        by: caller,
                        timestamp: txn.now,
                    });
                    cancelled.push(key);
                }
            }
            Ok(cancelled)
        })
    }

    /// Change the delay applied to future proposals.
    pub fn set_min_delay(&mut self, caller: Identity, delay: u64) -> DirectoryResult<()> {
        self.transact("set_min_delay", |txn| {
            txn.admin_gate(&caller)?;
            let old = std::mem::replace(&mut txn.layout.min_delay, delay);
            txn.emit(DirectoryEvent::MinDelayChanged {
                old,
                new: delay,
                timestamp: txn.now,
            });
            Ok(())
        })
    }

    pub fn min_delay(&self) -> u64 {
        self.layout.min_delay
    }

    pub fn pending_upgrade(&self, key: &Key) -> Option<PendingUpgrade> {
        self.layout.pending.get(key).copied()
    }

    pub fn upgrade_state(&self, key: &Key) -> UpgradeState {
        match self.layout.pending.get(key) {
            None => UpgradeState::Absent,
            Some(p) if self.env.now() >= p.execute_after => UpgradeState::Ready,
            Some(_) => UpgradeState::Scheduled,
        }
    }

    /// Size of the vocabulary `emergency_cancel_all` sweeps.
    pub fn vocabulary_size(&self) -> usize {
        FIXED_KEY_NAMES.len() + self.layout.dynamic_keys.len()
    }
}
