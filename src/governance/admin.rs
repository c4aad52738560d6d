//! Ownership, emergency role and pause gate

use serde::Serialize;

use super::access::Role;
use crate::directory::Directory;
use crate::errors::{DirectoryError, DirectoryResult};
use crate::observability::DirectoryEvent;
use crate::types::Identity;

/// Snapshot of who holds what.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GovernanceState {
    pub primary_owner: Identity,
    pub pending_owner: Option<Identity>,
    pub emergency: Identity,
    pub upgrader: Identity,
    pub paused: bool,
    pub version: u64,
    pub expected_version: u64,
}

fn require_non_null(identity: &Identity, what: &'static str) -> DirectoryResult<()> {
    if identity.is_zero() {
        return Err(DirectoryError::NullIdentity(what));
    }
    Ok(())
}

impl Directory {
    pub fn governance(&self) -> GovernanceState {
        GovernanceState {
            primary_owner: self.layout.primary_owner,
            pending_owner: self.layout.pending_owner,
            emergency: self.layout.emergency,
            upgrader: self.layout.upgrader,
            paused: self.layout.paused,
            version: self.layout.version,
            expected_version: self.expected_version,
        }
    }

    pub fn owner(&self) -> Identity {
        self.layout.primary_owner
    }

    pub fn pending_owner(&self) -> Option<Identity> {
        self.layout.pending_owner
    }

    pub fn is_paused(&self) -> bool {
        self.layout.paused
    }

    /// Owner or an external directory-admin grant.
    pub fn is_admin(&self, identity: &Identity) -> bool {
        *identity == self.layout.primary_owner
            || self.access.has_role(Role::DirectoryAdmin, identity)
    }

    /// First step of a two-step transfer. Overwrites an earlier nomination.
    pub fn set_pending_owner(&mut self, caller: Identity, new_owner: Identity) -> DirectoryResult<()> {
        self.transact("set_pending_owner", |txn| {
            txn.owner_gate(&caller)?;
            require_non_null(&new_owner, "pending owner")?;
            let old = txn.layout.pending_owner.replace(new_owner);
            txn.emit(DirectoryEvent::PendingAdminChanged {
                old,
                new: Some(new_owner),
                timestamp: txn.now,
            });
            Ok(())
        })
    }

    pub fn cancel_ownership_transfer(&mut self, caller: Identity) -> DirectoryResult<()> {
        self.transact("cancel_ownership_transfer", |txn| {
            txn.owner_gate(&caller)?;
            if let Some(old) = txn.layout.pending_owner.take() {
                txn.emit(DirectoryEvent::PendingAdminChanged {
                    old: Some(old),
                    new: None,
                    timestamp: txn.now,
                });
            }
            Ok(())
        })
    }

    /// Second step: only the nominated identity may accept.
    pub fn accept_ownership(&mut self, caller: Identity) -> DirectoryResult<()> {
        self.transact("accept_ownership", |txn| {
            txn.require_unpaused()?;
            txn.require_version()?;
            if txn.layout.pending_owner != Some(caller) {
                return Err(DirectoryError::NotPendingOwner(caller));
            }

            let old = std::mem::replace(&mut txn.layout.primary_owner, caller);
            txn.layout.pending_owner = None;
            txn.emit(DirectoryEvent::PendingAdminChanged {
                old: Some(caller),
                new: None,
                timestamp: txn.now,
            });
            txn.emit(DirectoryEvent::AdminChanged {
                old,
                new: caller,
                timestamp: txn.now,
            });
            Ok(())
        })
    }

    /// Direct reassignment. Any pending nomination is dropped.
    pub fn transfer_ownership(&mut self, caller: Identity, new_owner: Identity) -> DirectoryResult<()> {
        self.transact("transfer_ownership", |txn| {
            txn.owner_gate(&caller)?;
            require_non_null(&new_owner, "owner")?;

            let old = std::mem::replace(&mut txn.layout.primary_owner, new_owner);
            if let Some(pending) = txn.layout.pending_owner.take() {
                txn.emit(DirectoryEvent::PendingAdminChanged {
                    old: Some(pending),
                    new: None,
                    timestamp: txn.now,
                });
            }
            txn.emit(DirectoryEvent::AdminChanged {
                old,
                new: new_owner,
                timestamp: txn.now,
            });
            Ok(())
        })
    }

    pub fn set_emergency(&mut self, caller: Identity, new_emergency: Identity) -> DirectoryResult<()> {
        self.transact("set_emergency", |txn| {
            txn.owner_gate(&caller)?;
            require_non_null(&new_emergency, "emergency")?;
            let old = std::mem::replace(&mut txn.layout.emergency, new_emergency);
            txn.emit(DirectoryEvent::EmergencyChanged {
                old,
                new: new_emergency,
                timestamp: txn.now,
            });
            Ok(())
        })
    }

    pub fn set_upgrader(&mut self, caller: Identity, new_upgrader: Identity) -> DirectoryResult<()> {
        self.transact("set_upgrader", |txn| {
            txn.owner_gate(&caller)?;
            require_non_null(&new_upgrader, "upgrader")?;
            let old = std::mem::replace(&mut txn.layout.upgrader, new_upgrader);
            txn.emit(DirectoryEvent::UpgraderChanged {
                old,
                new: new_upgrader,
                timestamp: txn.now,
            });
            Ok(())
        })
    }

    /// Emergency power: take over the upgrade-capable role.
    pub fn recover_upgrade_authority(&mut self, caller: Identity) -> DirectoryResult<()> {
        self.transact("recover_upgrade_authority", |txn| {
            txn.require_version()?;
            txn.require_emergency(&caller)?;
            let old = std::mem::replace(&mut txn.layout.upgrader, caller);
            txn.emit(DirectoryEvent::UpgraderChanged {
                old,
                new: caller,
                timestamp: txn.now,
            });
            Ok(())
        })
    }

    /// Owner or emergency. Pausing twice is a no-op.
    pub fn pause(&mut self, caller: Identity) -> DirectoryResult<()> {
        self.transact("pause", |txn| {
            txn.require_version()?;
            txn.require_owner_or_emergency(&caller)?;
            if !txn.layout.paused {
                txn.layout.paused = true;
                txn.emit(DirectoryEvent::Paused {
                    by: caller,
                    timestamp: txn.now,
                });
            }
            Ok(())
        })
    }

    /// Owner only.
    pub fn unpause(&mut self, caller: Identity) -> DirectoryResult<()> {
        self.transact("unpause", |txn| {
            txn.require_version()?;
            txn.require_owner(&caller)?;
            if txn.layout.paused {
                txn.layout.paused = false;
                txn.emit(DirectoryEvent::Unpaused {
                    by: caller,
                    timestamp: txn.now,
                });
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::directory::{Collaborators, DirectoryConfig, InitParams};
    use crate::env::ManualEnvironment;
    use crate::governance::DenyAll;
    use crate::observability::MemoryEventSink;

    fn id(n: u64) -> Identity {
        Identity::from_low_u64(n)
    }

    fn setup() -> (Directory, MemoryEventSink) {
        let sink = MemoryEventSink::new();
        let collaborators = Collaborators::new(Arc::new(ManualEnvironment::new(1, 1)), Arc::new(DenyAll))
            .with_events(Arc::new(sink.clone()));
        let params = InitParams {
            owner: id(1),
            emergency: id(2),
            upgrader: id(3),
            min_delay: 0,
        };
        let dir = Directory::initialize(DirectoryConfig::default(), params, collaborators).unwrap();
        (dir, sink)
    }

    #[test]
    fn test_two_step_transfer() {
        let (mut dir, _) = setup();
        dir.set_pending_owner(id(1), id(9)).unwrap();
        assert_eq!(dir.pending_owner(), Some(id(9)));
        assert!(!dir.is_admin(&id(9)));

        assert_eq!(
            dir.accept_ownership(id(8)).unwrap_err(),
            DirectoryError::NotPendingOwner(id(8))
        );
        dir.accept_ownership(id(9)).unwrap();
        assert_eq!(dir.owner(), id(9));
        assert_eq!(dir.pending_owner(), None);
        assert!(dir.is_admin(&id(9)));
        assert!(!dir.is_admin(&id(1)));
    }

    #[test]
    fn test_direct_transfer_clears_pending() {
        let (mut dir, sink) = setup();
        dir.set_pending_owner(id(1), id(9)).unwrap();
        sink.clear();
        dir.transfer_ownership(id(1), id(4)).unwrap();
        assert_eq!(dir.owner(), id(4));
        assert_eq!(dir.pending_owner(), None);
        assert_eq!(sink.names(), vec!["PENDING_ADMIN_CHANGED", "ADMIN_CHANGED"]);
        assert!(dir.accept_ownership(id(9)).is_err());
    }

    #[test]
    fn test_pause_powers() {
        let (mut dir, _) = setup();
        assert!(matches!(
            dir.pause(id(5)),
            Err(DirectoryError::MissingRole { .. })
        ));
        dir.pause(id(2)).unwrap();
        assert!(dir.is_paused());

        // emergency cannot lift the pause
        assert!(dir.unpause(id(2)).is_err());
        dir.unpause(id(1)).unwrap();
        assert!(!dir.is_paused());
    }

    #[test]
    fn test_recover_upgrade_authority_while_paused() {
        let (mut dir, _) = setup();
        dir.pause(id(2)).unwrap();
        dir.recover_upgrade_authority(id(2)).unwrap();
        assert_eq!(dir.governance().upgrader, id(2));
        assert!(dir.recover_upgrade_authority(id(1)).is_err());
    }

    #[test]
    fn test_owner_ops_blocked_while_paused() {
        let (mut dir, _) = setup();
        dir.pause(id(1)).unwrap();
        assert_eq!(dir.set_emergency(id(1), id(6)).unwrap_err(), DirectoryError::Paused);
        assert_eq!(dir.set_pending_owner(id(1), id(6)).unwrap_err(), DirectoryError::Paused);
    }

    #[test]
    fn test_null_owner_rejected() {
        let (mut dir, _) = setup();
        assert_eq!(
            dir.transfer_ownership(id(1), Identity::zero()).unwrap_err(),
            DirectoryError::NullIdentity("owner")
        );
    }
}
