//! Execution environment
//!
//! The directory never reads the wall clock or the network identity
//! directly. Both come from an injected `Environment`, which keeps every
//! operation deterministic under test.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Source of the current time and the live network identity.
pub trait Environment: Send + Sync {
    /// Current time in unix seconds.
    fn now(&self) -> u64;

    /// Identity of the network the directory currently runs on.
    fn network_id(&self) -> u64;
}

/// Wall-clock environment with a fixed network identity.
#[derive(Debug, Clone)]
pub struct SystemEnvironment {
    network_id: u64,
}

impl SystemEnvironment {
    pub fn new(network_id: u64) -> Self {
        Self { network_id }
    }
}

impl Environment for SystemEnvironment {
    fn now(&self) -> u64 {
        // Pre-epoch clocks are clamped to zero.
        u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
    }

    fn network_id(&self) -> u64 {
        self.network_id
    }
}

/// Manually driven environment. Clones share the same clock.
#[derive(Debug, Clone, Default)]
pub struct ManualEnvironment {
    now: Arc<AtomicU64>,
    network_id: Arc<AtomicU64>,
}

impl ManualEnvironment {
    pub fn new(now: u64, network_id: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(now)),
            network_id: Arc::new(AtomicU64::new(network_id)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    /// Set the clock to an absolute value.
    pub fn set_now(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Simulate redeployment onto another network.
    pub fn set_network_id(&self, network_id: u64) {
        self.network_id.store(network_id, Ordering::SeqCst);
    }
}

impl Environment for ManualEnvironment {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn network_id(&self) -> u64 {
        self.network_id.load(Ordering::SeqCst)
    }
}
