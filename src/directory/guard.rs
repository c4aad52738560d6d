//! Single-flag reentrancy lock

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::errors::{DirectoryError, DirectoryResult};

/// Rejects a guarded operation while another one is in flight.
#[derive(Debug, Clone, Default)]
pub struct ReentrancyGuard {
    entered: Arc<AtomicBool>,
}

/// Held for the duration of a guarded operation; releases on drop.
#[derive(Debug)]
pub struct GuardToken {
    entered: Arc<AtomicBool>,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) -> DirectoryResult<GuardToken> {
        self.entered
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| DirectoryError::Reentrant)?;
        Ok(GuardToken {
            entered: Arc::clone(&self.entered),
        })
    }

    pub fn is_entered(&self) -> bool {
        self.entered.load(Ordering::Acquire)
    }
}

impl Drop for GuardToken {
    fn drop(&mut self) {
        self.entered.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_entry_rejected() {
        let guard = ReentrancyGuard::new();
        let token = guard.enter().unwrap();
        assert!(guard.is_entered());
        assert_eq!(guard.enter().unwrap_err(), DirectoryError::Reentrant);
        drop(token);
        assert!(!guard.is_entered());
        assert!(guard.enter().is_ok());
    }

    #[test]
    fn test_released_on_error_path() {
        let guard = ReentrancyGuard::new();
        let run = || -> DirectoryResult<()> {
            let _token = guard.enter()?;
            Err(DirectoryError::Paused)
        };
        assert!(run().is_err());
        assert!(!guard.is_entered());
    }
}
