//! The directory value
//!
//! `Directory` exclusively owns the layout. Every mutating call runs as a
//! transaction over a staged copy of the layout:
//!
//! 1. pause gate (unless the call is an emergency power)
//! 2. version gate: live layout version == version the logic expects
//! 3. authorization
//! 4. validation and mutation of the staged copy
//!
//! The staged copy replaces the live layout only if every step succeeds,
//! and events are delivered only after that swap. A failed call leaves the
//! layout and the event stream untouched.

use std::sync::Arc;

use super::config::DirectoryConfig;
use super::guard::ReentrancyGuard;
use crate::env::Environment;
use crate::errors::{DirectoryError, DirectoryResult};
use crate::governance::{AccessControl, Role};
use crate::observability::{deliver, DirectoryEvent, EventSink, LogEventSink, Logger};
use crate::permit::DomainCache;
use crate::store::Layout;
use crate::types::Identity;

/// Collaborators wired in at construction.
#[derive(Clone)]
pub struct Collaborators {
    pub env: Arc<dyn Environment>,
    pub access: Arc<dyn AccessControl>,
    pub events: Arc<dyn EventSink>,
}

impl Collaborators {
    /// Events default to the JSON logger.
    pub fn new(env: Arc<dyn Environment>, access: Arc<dyn AccessControl>) -> Self {
        Self {
            env,
            access,
            events: Arc::new(LogEventSink),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }
}

/// Initial governance parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitParams {
    pub owner: Identity,
    pub emergency: Identity,
    pub upgrader: Identity,
    pub min_delay: u64,
}

/// Governance-controlled module directory.
pub struct Directory {
    pub(crate) layout: Layout,
    pub(crate) config: DirectoryConfig,
    pub(crate) expected_version: u64,
    pub(crate) env: Arc<dyn Environment>,
    pub(crate) access: Arc<dyn AccessControl>,
    pub(crate) events: Arc<dyn EventSink>,
    pub(crate) domain: DomainCache,
    pub(crate) guard: ReentrancyGuard,
}

/// Staged state of one in-flight operation.
pub(crate) struct Txn<'a> {
    pub layout: Layout,
    pub now: u64,
    pub config: &'a DirectoryConfig,
    access: &'a dyn AccessControl,
    expected_version: u64,
    events: Vec<DirectoryEvent>,
}

impl<'a> Txn<'a> {
    pub fn emit(&mut self, event: DirectoryEvent) {
        self.events.push(event);
    }

    pub fn require_unpaused(&self) -> DirectoryResult<()> {
        if self.layout.paused {
            return Err(DirectoryError::Paused);
        }
        Ok(())
    }

    pub fn require_version(&self) -> DirectoryResult<()> {
        if self.layout.version != self.expected_version {
            return Err(DirectoryError::VersionMismatch {
                expected: self.expected_version,
                actual: self.layout.version,
            });
        }
        Ok(())
    }

    pub fn require_owner(&self, caller: &Identity) -> DirectoryResult<()> {
        if *caller != self.layout.primary_owner {
            return Err(DirectoryError::missing_role("PRIMARY_OWNER", *caller));
        }
        Ok(())
    }

    pub fn require_emergency(&self, caller: &Identity) -> DirectoryResult<()> {
        if *caller != self.layout.emergency {
            return Err(DirectoryError::missing_role("EMERGENCY", *caller));
        }
        Ok(())
    }

    pub fn require_owner_or_emergency(&self, caller: &Identity) -> DirectoryResult<()> {
        if *caller != self.layout.primary_owner && *caller != self.layout.emergency {
            return Err(DirectoryError::missing_role("PRIMARY_OWNER_OR_EMERGENCY", *caller));
        }
        Ok(())
    }

    pub fn require_upgrader(&self, caller: &Identity) -> DirectoryResult<()> {
        if *caller != self.layout.upgrader {
            return Err(DirectoryError::missing_role("UPGRADER", *caller));
        }
        Ok(())
    }

    /// Owner, or an external `DirectoryAdmin` grant.
    pub fn require_admin(&self, caller: &Identity) -> DirectoryResult<()> {
        if *caller == self.layout.primary_owner {
            return Ok(());
        }
        self.access.require_role(Role::DirectoryAdmin, caller)
    }

    pub fn require_role(&self, role: Role, caller: &Identity) -> DirectoryResult<()> {
        self.access.require_role(role, caller)
    }

    /// The standard gate for non-emergency admin writes.
    pub fn admin_gate(&self, caller: &Identity) -> DirectoryResult<()> {
        self.require_unpaused()?;
        self.require_version()?;
        self.require_admin(caller)
    }

    /// The standard gate for owner-only writes.
    pub fn owner_gate(&self, caller: &Identity) -> DirectoryResult<()> {
        self.require_unpaused()?;
        self.require_version()?;
        self.require_owner(caller)
    }
}

impl Directory {
    /// Create a fresh directory at the configured layout version.
    pub fn initialize(
        config: DirectoryConfig,
        params: InitParams,
        collaborators: Collaborators,
    ) -> DirectoryResult<Self> {
        config.validate()?;
        for (identity, what) in [
            (&params.owner, "owner"),
            (&params.emergency, "emergency"),
            (&params.upgrader, "upgrader"),
        ] {
            if identity.is_zero() {
                return Err(DirectoryError::NullIdentity(what));
            }
        }

        let layout = Layout::new(
            config.expected_layout_version,
            params.owner,
            params.emergency,
            params.upgrader,
            params.min_delay,
            config.history_capacity,
        );

        Logger::info(
            "DIRECTORY_INITIALIZED",
            &[
                ("owner", &params.owner.to_hex()),
                ("emergency", &params.emergency.to_hex()),
                ("min_delay", &params.min_delay.to_string()),
                ("version", &layout.version.to_string()),
            ],
        );

        Ok(Self::assemble(layout, config, collaborators))
    }

    /// Wrap an existing layout. The layout version is not required to match;
    /// a mismatch only blocks mutations.
    pub fn open(
        layout: Layout,
        config: DirectoryConfig,
        collaborators: Collaborators,
    ) -> DirectoryResult<Self> {
        config.validate()?;
        layout.check_integrity()?;
        if layout.version != config.expected_layout_version {
            Logger::warn(
                "LAYOUT_VERSION_MISMATCH",
                &[
                    ("expected", &config.expected_layout_version.to_string()),
                    ("actual", &layout.version.to_string()),
                ],
            );
        }
        Ok(Self::assemble(layout, config, collaborators))
    }

    fn assemble(layout: Layout, config: DirectoryConfig, collaborators: Collaborators) -> Self {
        let domain = DomainCache::new(config.domain_params(), config.network_id);
        Self {
            expected_version: config.expected_layout_version,
            layout,
            config,
            env: collaborators.env,
            access: collaborators.access,
            events: collaborators.events,
            domain,
            guard: ReentrancyGuard::new(),
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn into_layout(self) -> Layout {
        self.layout
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Layout version the running logic operates on.
    pub fn expected_version(&self) -> u64 {
        self.expected_version
    }

    /// Live layout version.
    pub fn version(&self) -> u64 {
        self.layout.version
    }

    pub fn now(&self) -> u64 {
        self.env.now()
    }

    /// Lock held by permit redemption and migration.
    pub fn reentrancy_guard(&self) -> &ReentrancyGuard {
        &self.guard
    }

    /// Run `f` against a staged copy of the layout; commit on success.
    pub(crate) fn transact<T>(
        &mut self,
        op: &'static str,
        f: impl FnOnce(&mut Txn<'_>) -> DirectoryResult<T>,
    ) -> DirectoryResult<T> {
        let mut txn = Txn {
            layout: self.layout.clone(),
            now: self.env.now(),
            config: &self.config,
            access: self.access.as_ref(),
            expected_version: self.expected_version,
            events: Vec::new(),
        };

        match f(&mut txn) {
            Ok(value) => {
                let Txn { layout, events, .. } = txn;
                self.layout = layout;
                Logger::trace("DIRECTORY_OP_COMMITTED", &[("op", op)]);
                deliver(self.events.as_ref(), events);
                Ok(value)
            }
            Err(e) => {
                Logger::warn(
                    "DIRECTORY_OP_REJECTED",
                    &[("op", op), ("code", e.code()), ("reason", &e.to_string())],
                );
                Err(e)
            }
        }
    }

    /// Deliver events produced outside a transaction.
    pub(crate) fn publish(&self, events: Vec<DirectoryEvent>) {
        deliver(self.events.as_ref(), events);
    }
}
