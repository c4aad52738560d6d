//! Directory events
//!
//! Facts emitted for off-process observers and indexers. They are
//! notifications only: nothing in the directory reads them back.
//! Events are collected while an operation runs and delivered only after
//! it commits, so a rolled-back call emits nothing.

use std::fmt;

use serde::Serialize;

use crate::types::{Identifier, Identity, Key};

/// Observable directory events
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DirectoryEvent {
    // Directory writes
    ModuleChanged {
        key: Key,
        old: Identifier,
        new: Identifier,
        executor: Identity,
        timestamp: u64,
    },
    /// Idempotent write: requested value already stored
    ModuleUnchanged {
        key: Key,
        identifier: Identifier,
        executor: Identity,
        timestamp: u64,
    },
    /// One aggregated event per batch, listing only the changed items
    BatchChanged {
        keys: Vec<Key>,
        identifiers: Vec<Identifier>,
        executor: Identity,
        timestamp: u64,
    },
    HistoryRecorded {
        key: Key,
        slot: usize,
        cursor: u64,
        executor: Identity,
        timestamp: u64,
    },

    // Scheduler
    UpgradeScheduled {
        key: Key,
        new_identifier: Identifier,
        execute_after: u64,
        delay: u64,
        proposer: Identity,
        replaced: Option<Identifier>,
        timestamp: u64,
    },
    UpgradeCancelled {
        key: Key,
        identifier: Identifier,
        by: Identity,
        timestamp: u64,
    },
    UpgradeExecuted {
        key: Key,
        old: Identifier,
        new: Identifier,
        changed: bool,
        executor: Identity,
        timestamp: u64,
    },
    MinDelayChanged {
        old: u64,
        new: u64,
        timestamp: u64,
    },

    // Governance
    AdminChanged {
        old: Identity,
        new: Identity,
        timestamp: u64,
    },
    PendingAdminChanged {
        old: Option<Identity>,
        new: Option<Identity>,
        timestamp: u64,
    },
    EmergencyChanged {
        old: Identity,
        new: Identity,
        timestamp: u64,
    },
    UpgraderChanged {
        old: Identity,
        new: Identity,
        timestamp: u64,
    },
    Paused {
        by: Identity,
        timestamp: u64,
    },
    Unpaused {
        by: Identity,
        timestamp: u64,
    },
    StorageMigrated {
        from: u64,
        to: u64,
        by: Identity,
        timestamp: u64,
    },
    LogicVersionInstalled {
        old: u64,
        new: u64,
        by: Identity,
        timestamp: u64,
    },

    // Permits
    PermitConsumed {
        signer: Identity,
        nonce: u64,
        relayer: Identity,
        timestamp: u64,
    },

    // Dynamic keys
    KeyRegistered {
        key: Key,
        name: String,
        registrar: Identity,
        timestamp: u64,
    },
    KeyUnregistered {
        key: Key,
        name: String,
        by: Identity,
        timestamp: u64,
    },
}

impl DirectoryEvent {
    /// Returns the event name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            DirectoryEvent::ModuleChanged { .. } => "MODULE_CHANGED",
            DirectoryEvent::ModuleUnchanged { .. } => "MODULE_UNCHANGED",
            DirectoryEvent::BatchChanged { .. } => "BATCH_CHANGED",
            DirectoryEvent::HistoryRecorded { .. } => "HISTORY_RECORDED",
            DirectoryEvent::UpgradeScheduled { .. } => "UPGRADE_SCHEDULED",
            DirectoryEvent::UpgradeCancelled { .. } => "UPGRADE_CANCELLED",
            DirectoryEvent::UpgradeExecuted { .. } => "UPGRADE_EXECUTED",
            DirectoryEvent::MinDelayChanged { .. } => "MIN_DELAY_CHANGED",
            DirectoryEvent::AdminChanged { .. } => "ADMIN_CHANGED",
            DirectoryEvent::PendingAdminChanged { .. } => "PENDING_ADMIN_CHANGED",
            DirectoryEvent::EmergencyChanged { .. } => "EMERGENCY_CHANGED",
            DirectoryEvent::UpgraderChanged { .. } => "UPGRADER_CHANGED",
            DirectoryEvent::Paused { .. } => "PAUSED",
            DirectoryEvent::Unpaused { .. } => "UNPAUSED",
            DirectoryEvent::StorageMigrated { .. } => "STORAGE_MIGRATED",
            DirectoryEvent::LogicVersionInstalled { .. } => "LOGIC_VERSION_INSTALLED",
            DirectoryEvent::PermitConsumed { .. } => "PERMIT_CONSUMED",
            DirectoryEvent::KeyRegistered { .. } => "KEY_REGISTERED",
            DirectoryEvent::KeyUnregistered { .. } => "KEY_UNREGISTERED",
        }
    }

    /// Flattened `name -> value` pairs, sorted by name, for the logger.
    pub fn fields(&self) -> Vec<(String, String)> {
        let value = match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => return Vec::new(),
        };
        value
            .into_iter()
            .filter(|(k, _)| k != "event")
            .map(|(k, v)| {
                let rendered = match v {
                    serde_json::Value::String(s) => s,
                    serde_json::Value::Null => "null".to_string(),
                    other => other.to_string(),
                };
                (k, rendered)
            })
            .collect()
    }
}

impl fmt::Display for DirectoryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_tag_matches_name() {
        let event = DirectoryEvent::Paused {
            by: Identity::from_low_u64(2),
            timestamp: 10,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], event.as_str());
        assert_eq!(json["timestamp"], 10);
    }

    #[test]
    fn test_fields_exclude_tag() {
        let event = DirectoryEvent::MinDelayChanged {
            old: 60,
            new: 3600,
            timestamp: 5,
        };
        let fields = event.fields();
        assert!(fields.iter().all(|(k, _)| k != "event"));
        assert!(fields.contains(&("new".to_string(), "3600".to_string())));
    }

    #[test]
    fn test_names_are_upper_snake() {
        let event = DirectoryEvent::KeyRegistered {
            key: Key::from_name("bridge"),
            name: "bridge".into(),
            registrar: Identity::from_low_u64(1),
            timestamp: 0,
        };
        assert!(event.as_str().chars().all(|c| c.is_ascii_uppercase() || c == '_'));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "KEY_REGISTERED");
    }
}
