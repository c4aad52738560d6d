//! Storage migration
//!
//! A migration moves the live layout from one version to the next:
//!
//! 1. live version must equal `from`, caller must be the upgrader,
//!    `to` must be above `from`
//! 2. structural integrity check on the staged layout
//! 3. the external `Migrator` rewrites the staged layout in place
//! 4. integrity check again
//! 5. version bumped to `to`
//!
//! Migration is not pause-gated and does not require the running logic's
//! expected version to match: it is the path that fixes a mismatch. After
//! a successful migration, mutations stay blocked until the running logic
//! adopts the new version through `install_logic_version`.

use crate::directory::Directory;
use crate::errors::{DirectoryError, DirectoryResult};
use crate::observability::{DirectoryEvent, Logger};
use crate::store::Layout;
use crate::types::Identity;

/// External component that rewrites the layout between versions.
pub trait Migrator {
    fn name(&self) -> &str;

    /// Rewrite `layout` from `from` to `to`. Must not touch `layout.version`.
    fn migrate(&self, layout: &mut Layout, from: u64, to: u64) -> Result<(), String>;
}

/// Migrator that changes nothing but the version tag.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMigrator;

impl Migrator for NoopMigrator {
    fn name(&self) -> &str {
        "noop"
    }

    fn migrate(&self, _layout: &mut Layout, _from: u64, _to: u64) -> Result<(), String> {
        Ok(())
    }
}

impl Directory {
    pub fn migrate(
        &mut self,
        caller: Identity,
        from: u64,
        to: u64,
        migrator: &dyn Migrator,
    ) -> DirectoryResult<()> {
        let _token = self.guard.enter()?;

        self.transact("migrate", |txn| {
            if txn.layout.version != from {
                return Err(DirectoryError::VersionMismatch {
                    expected: from,
                    actual: txn.layout.version,
                });
            }
            txn.require_upgrader(&caller)?;
            if to <= from {
                return Err(DirectoryError::InvalidTarget { from, to });
            }

            txn.layout.check_integrity()?;
            migrator
                .migrate(&mut txn.layout, from, to)
                .map_err(DirectoryError::MigrationFailed)?;
            if txn.layout.version != from {
                return Err(DirectoryError::MigrationFailed(format!(
                    "migrator '{}' rewrote the version tag",
                    migrator.name()
                )));
            }
            txn.layout.check_integrity()?;

            txn.layout.version = to;
            txn.emit(DirectoryEvent::StorageMigrated {
                from,
                to,
                by: caller,
                timestamp: txn.now,
            });
            Ok(())
        })?;

        Logger::info(
            "MIGRATION_APPLIED",
            &[
                ("from", &from.to_string()),
                ("migrator", migrator.name()),
                ("to", &to.to_string()),
            ],
        );
        Ok(())
    }

    /// Switch the running logic to `version`, which must be the live
    /// layout version.
    pub fn install_logic_version(&mut self, caller: Identity, version: u64) -> DirectoryResult<()> {
        if caller != self.layout.upgrader {
            let err = DirectoryError::missing_role("UPGRADER", caller);
            Logger::warn(
                "DIRECTORY_OP_REJECTED",
                &[("code", err.code()), ("op", "install_logic_version")],
            );
            return Err(err);
        }
        if version != self.layout.version {
            let err = DirectoryError::VersionMismatch {
                expected: version,
                actual: self.layout.version,
            };
            Logger::warn(
                "DIRECTORY_OP_REJECTED",
                &[("code", err.code()), ("op", "install_logic_version")],
            );
            return Err(err);
        }

        let old = std::mem::replace(&mut self.expected_version, version);
        let timestamp = self.env.now();
        self.publish(vec![DirectoryEvent::LogicVersionInstalled {
            old,
            new: version,
            by: caller,
            timestamp,
        }]);
        Ok(())
    }
}
