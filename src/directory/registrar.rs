//! Runtime key registration.
//!
//! Unregistering a key does not touch the module map, pending upgrades or
//! history stored under it; the key only leaves the known vocabulary.

use super::directory::Directory;
use crate::errors::DirectoryResult;
use crate::governance::Role;
use crate::keys::{fixed_key, DynamicKey};
use crate::observability::DirectoryEvent;
use crate::types::{Identity, Key};

impl Directory {
    pub fn register_key(&mut self, caller: Identity, raw_name: &str) -> DirectoryResult<DynamicKey> {
        let limits = self.config.key_limits();
        self.transact("register_key", |txn| {
            txn.require_unpaused()?;
            txn.require_version()?;
            txn.require_role(Role::KeyRegistrar, &caller)?;

            let entry = txn
                .layout
                .dynamic_keys
                .register(raw_name, &limits, caller, txn.now)?;
            txn.emit(DirectoryEvent::KeyRegistered {
                key: entry.key,
                name: entry.name.clone(),
                registrar: caller,
                timestamp: txn.now,
            });
            Ok(entry)
        })
    }

    pub fn unregister_key(&mut self, caller: Identity, key: Key) -> DirectoryResult<DynamicKey> {
        self.transact("unregister_key", |txn| {
            txn.require_unpaused()?;
            txn.require_version()?;
            txn.require_role(Role::SystemAdmin, &caller)?;

            let removed = txn.layout.dynamic_keys.unregister(&key)?;
            txn.emit(DirectoryEvent::KeyUnregistered {
                key,
                name: removed.name.clone(),
                by: caller,
                timestamp: txn.now,
            });
            Ok(removed)
        })
    }

    /// Dynamic keys in registry slot order.
    pub fn known_keys(&self) -> &[DynamicKey] {
        self.layout.dynamic_keys.entries()
    }

    /// Resolve a fixed name (exact) or a dynamic name (normalized).
    pub fn resolve_name(&self, name: &str) -> Option<Key> {
        fixed_key(name).or_else(|| self.layout.dynamic_keys.key_for_name(name))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::directory::{Collaborators, DirectoryConfig, InitParams};
    use crate::env::ManualEnvironment;
    use crate::errors::DirectoryError;
    use crate::governance::StaticAccessControl;
    use crate::observability::MemoryEventSink;
    use crate::types::Identifier;

    const REGISTRAR: u64 = 10;
    const SYSADMIN: u64 = 11;

    fn setup() -> (Directory, MemoryEventSink) {
        let sink = MemoryEventSink::new();
        let access = StaticAccessControl::new()
            .grant(Role::KeyRegistrar, Identity::from_low_u64(REGISTRAR))
            .grant(Role::SystemAdmin, Identity::from_low_u64(SYSADMIN));
        let collaborators =
            Collaborators::new(Arc::new(ManualEnvironment::new(77, 1)), Arc::new(access))
                .with_events(Arc::new(sink.clone()));
        let params = InitParams {
            owner: Identity::from_low_u64(1),
            emergency: Identity::from_low_u64(2),
            upgrader: Identity::from_low_u64(3),
            min_delay: 0,
        };
        let dir = Directory::initialize(DirectoryConfig::default(), params, collaborators).unwrap();
        (dir, sink)
    }

    #[test]
    fn test_register_and_resolve() {
        let (mut dir, sink) = setup();
        let entry = dir
            .register_key(Identity::from_low_u64(REGISTRAR), "  Bridge_Adapter ")
            .unwrap();
        assert_eq!(entry.name, "bridge_adapter");
        assert_eq!(entry.registered_at, 77);
        assert_eq!(dir.resolve_name("BRIDGE_ADAPTER"), Some(entry.key));
        assert_eq!(dir.resolve_name("TREASURY"), fixed_key("TREASURY"));
        assert_eq!(sink.names(), vec!["KEY_REGISTERED"]);
    }

    #[test]
    fn test_owner_is_not_a_registrar() {
        let (mut dir, _) = setup();
        assert!(matches!(
            dir.register_key(Identity::from_low_u64(1), "bridge"),
            Err(DirectoryError::MissingRole { .. })
        ));
    }

    #[test]
    fn test_unregister_requires_system_admin_and_keeps_module() {
        let (mut dir, _) = setup();
        let entry = dir
            .register_key(Identity::from_low_u64(REGISTRAR), "bridge")
            .unwrap();
        dir.set(Identity::from_low_u64(1), entry.key, Identifier::from_low_u64(9), false)
            .unwrap();

        assert!(matches!(
            dir.unregister_key(Identity::from_low_u64(REGISTRAR), entry.key),
            Err(DirectoryError::MissingRole { .. })
        ));
        dir.unregister_key(Identity::from_low_u64(SYSADMIN), entry.key)
            .unwrap();
        assert!(dir.known_keys().is_empty());
        assert_eq!(dir.get(&entry.key), Some(Identifier::from_low_u64(9)));

        assert!(matches!(
            dir.unregister_key(Identity::from_low_u64(SYSADMIN), entry.key),
            Err(DirectoryError::NotFound(_))
        ));
    }
}
