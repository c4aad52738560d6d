//! Immediate-write path: set, batch set, reads.

use serde::Serialize;

use super::directory::{Directory, Txn};
use crate::errors::{DirectoryError, DirectoryResult};
use crate::history::HistoryLedger;
use crate::observability::DirectoryEvent;
use crate::store::HistoryEntry;
use crate::types::{Identifier, Identity, Key};

/// Result of a single write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SetOutcome {
    pub changed: bool,
    /// Identifier stored before the call, if any
    pub previous: Option<Identifier>,
}

/// Result of a batch write. Only keys whose value actually changed are listed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub changed: Vec<Key>,
}

impl BatchOutcome {
    pub fn changed_count(&self) -> usize {
        self.changed.len()
    }
}

/// Per-item rule shared by every commit path.
///
/// Returns the old identifier when the map was updated, `None` when the
/// requested value is already stored.
fn apply(
    txn: &mut Txn<'_>,
    key: Key,
    identifier: Identifier,
    allow_replace: bool,
) -> DirectoryResult<Option<Identifier>> {
    if identifier.is_zero() {
        return Err(DirectoryError::InvalidIdentifier);
    }
    match txn.layout.module(&key) {
        Some(current) if current == identifier => Ok(None),
        Some(_) if !allow_replace => Err(DirectoryError::AlreadyRegistered(key)),
        current => {
            txn.layout.modules.insert(key, identifier);
            Ok(Some(current.unwrap_or_else(Identifier::zero)))
        }
    }
}

/// Append the audit record for a committed change.
pub(crate) fn record_history(
    txn: &mut Txn<'_>,
    key: Key,
    old: Identifier,
    new: Identifier,
    executor: Identity,
) -> usize {
    let entry = HistoryEntry {
        old_identifier: old,
        new_identifier: new,
        timestamp: txn.now,
        executor,
    };
    HistoryLedger::append(&mut txn.layout, key, entry)
}

/// Single write with auditing. `executor` is whoever the change is
/// attributed to: the caller, or the signer of a permit.
pub(crate) fn commit_single(
    txn: &mut Txn<'_>,
    executor: Identity,
    key: Key,
    identifier: Identifier,
    allow_replace: bool,
) -> DirectoryResult<SetOutcome> {
    let previous = txn.layout.module(&key);
    match apply(txn, key, identifier, allow_replace)? {
        None => {
            txn.emit(DirectoryEvent::ModuleUnchanged {
                key,
                identifier,
                executor,
                timestamp: txn.now,
            });
            Ok(SetOutcome {
                changed: false,
                previous,
            })
        }
        Some(old) => {
            let slot = record_history(txn, key, old, identifier, executor);
            txn.emit(DirectoryEvent::ModuleChanged {
                key,
                old,
                new: identifier,
                executor,
                timestamp: txn.now,
            });
            txn.emit(DirectoryEvent::HistoryRecorded {
                key,
                slot,
                cursor: HistoryLedger::cursor(&txn.layout, &key),
                executor,
                timestamp: txn.now,
            });
            Ok(SetOutcome {
                changed: true,
                previous,
            })
        }
    }
}

/// Batch write with one aggregated event.
pub(crate) fn commit_batch(
    txn: &mut Txn<'_>,
    executor: Identity,
    keys: &[Key],
    identifiers: &[Identifier],
    allow_replace: bool,
) -> DirectoryResult<BatchOutcome> {
    if keys.len() != identifiers.len() {
        return Err(DirectoryError::LengthMismatch {
            keys: keys.len(),
            identifiers: identifiers.len(),
        });
    }
    let max = txn.config.max_batch_size;
    if keys.len() > max {
        return Err(DirectoryError::BatchTooLarge {
            size: keys.len(),
            max,
        });
    }

    let mut changed_keys = Vec::new();
    let mut changed_ids = Vec::new();
    for (key, identifier) in keys.iter().zip(identifiers) {
        if let Some(old) = apply(txn, *key, *identifier, allow_replace)? {
            record_history(txn, *key, old, *identifier, executor);
            changed_keys.push(*key);
            changed_ids.push(*identifier);
        }
    }

    if !changed_keys.is_empty() {
        txn.emit(DirectoryEvent::BatchChanged {
            keys: changed_keys.clone(),
            identifiers: changed_ids,
            executor,
            timestamp: txn.now,
        });
    }
    Ok(BatchOutcome {
        changed: changed_keys,
    })
}

impl Directory {
    /// Immediate write of one entry.
    pub fn set(
        &mut self,
        caller: Identity,
        key: Key,
        identifier: Identifier,
        allow_replace: bool,
    ) -> DirectoryResult<SetOutcome> {
        self.transact("set", |txn| {
            txn.admin_gate(&caller)?;
            commit_single(txn, caller, key, identifier, allow_replace)
        })
    }

    /// Immediate write of up to `max_batch_size` entries, all or nothing.
    pub fn set_batch(
        &mut self,
        caller: Identity,
        keys: &[Key],
        identifiers: &[Identifier],
        allow_replace: bool,
    ) -> DirectoryResult<BatchOutcome> {
        self.transact("set_batch", |txn| {
            txn.admin_gate(&caller)?;
            commit_batch(txn, caller, keys, identifiers, allow_replace)
        })
    }

    pub fn get(&self, key: &Key) -> Option<Identifier> {
        self.layout.module(key)
    }

    pub fn get_or_fail(&self, key: &Key) -> DirectoryResult<Identifier> {
        self.get(key)
            .ok_or_else(|| DirectoryError::NotFound(format!("module {}", key)))
    }

    pub fn is_registered(&self, key: &Key) -> bool {
        self.get(key).is_some()
    }
}
