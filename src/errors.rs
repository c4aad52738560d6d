//! # Directory Errors
//!
//! Every failure leaves the layout unchanged. Errors are grouped into the
//! classes a caller needs to decide what to do next:
//!
//! - input validation: fix the request
//! - authorization: obtain a new, valid request
//! - state consistency: refresh the view of the directory, then retry

use std::fmt;

use thiserror::Error;

use crate::types::{Identity, Key};

/// Result type for directory operations
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Error class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Caller-fixable, never retried automatically
    InputValidation,
    /// Surfaced immediately, no retry without a new request
    Authorization,
    /// Caller's view is stale
    StateConsistency,
    /// Storage, configuration or migrator failure
    Internal,
}

impl ErrorClass {
    /// Returns the class name
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::InputValidation => "INPUT_VALIDATION",
            ErrorClass::Authorization => "AUTHORIZATION",
            ErrorClass::StateConsistency => "STATE_CONSISTENCY",
            ErrorClass::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Directory errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    // ==================
    // Input Validation
    // ==================

    /// Null identifier supplied where a real one is required
    #[error("identifier must not be null")]
    InvalidIdentifier,

    /// Null identity supplied for a governance role
    #[error("{0} must not be null")]
    NullIdentity(&'static str),

    /// Dynamic key name failed normalization
    #[error("invalid key name: {0}")]
    InvalidName(String),

    /// Batch arrays differ in length
    #[error("length mismatch: {keys} keys, {identifiers} identifiers")]
    LengthMismatch { keys: usize, identifiers: usize },

    /// Batch exceeds the configured cap
    #[error("batch of {size} exceeds cap of {max}")]
    BatchTooLarge { size: usize, max: usize },

    /// History read past the stored entries
    #[error("history index {index} out of bounds (count {count})")]
    IndexOutOfBounds { index: usize, count: usize },

    /// Malformed hex value
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// Migration target is not above the source version
    #[error("invalid migration target: {from} -> {to}")]
    InvalidTarget { from: u64, to: u64 },

    // ==================
    // Authorization
    // ==================

    /// Caller lacks the role required for the action
    #[error("{identity} is missing role {action}")]
    MissingRole { action: String, identity: Identity },

    /// Caller is not the pending owner
    #[error("{0} is not the pending owner")]
    NotPendingOwner(Identity),

    /// Signature is malformed or does not recover to a signer
    #[error("invalid signature: {0}")]
    InvalidSignature(&'static str),

    /// Permit nonce does not equal the signer's counter
    #[error("invalid nonce for {signer}: expected {expected}, got {got}")]
    InvalidNonce {
        signer: Identity,
        expected: u64,
        got: u64,
    },

    /// Permit deadline has passed
    #[error("permit expired at {deadline} (now {now})")]
    Expired { deadline: u64, now: u64 },

    /// Pause gate is set
    #[error("directory is paused")]
    Paused,

    // ==================
    // State Consistency
    // ==================

    /// Layout version differs from what the running logic expects
    #[error("layout version mismatch: expected {expected}, found {actual}")]
    VersionMismatch { expected: u64, actual: u64 },

    /// Nothing stored where something was expected
    #[error("not found: {0}")]
    NotFound(String),

    /// Timelock has not elapsed
    #[error("upgrade not ready until {execute_after} (now {now})")]
    NotReady { execute_after: u64, now: u64 },

    /// Name or key already taken
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Key already holds a different identifier and replacement was forbidden
    #[error("key {0} already registered")]
    AlreadyRegistered(Key),

    /// Timestamp arithmetic overflowed
    #[error("timestamp overflow")]
    Overflow,

    /// Fixed cap reached
    #[error("limit of {max} exceeded")]
    LimitExceeded { max: usize },

    /// Call attempted while a guarded operation is in flight
    #[error("reentrant call rejected")]
    Reentrant,

    // ==================
    // Internal
    // ==================

    /// Layout failed the structural integrity check
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    /// External migrator reported failure
    #[error("migration failed: {0}")]
    MigrationFailed(String),

    /// Persisted layout could not be read or written
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration is invalid
    #[error("config error: {0}")]
    Config(String),
}

impl DirectoryError {
    /// Returns the class of this error
    pub fn class(&self) -> ErrorClass {
        match self {
            DirectoryError::InvalidIdentifier
            | DirectoryError::NullIdentity(_)
            | DirectoryError::InvalidName(_)
            | DirectoryError::LengthMismatch { .. }
            | DirectoryError::BatchTooLarge { .. }
            | DirectoryError::IndexOutOfBounds { .. }
            | DirectoryError::InvalidHex(_)
            | DirectoryError::InvalidTarget { .. } => ErrorClass::InputValidation,

            DirectoryError::MissingRole { .. }
            | DirectoryError::NotPendingOwner(_)
            | DirectoryError::InvalidSignature(_)
            | DirectoryError::InvalidNonce { .. }
            | DirectoryError::Expired { .. }
            | DirectoryError::Paused => ErrorClass::Authorization,

            DirectoryError::VersionMismatch { .. }
            | DirectoryError::NotFound(_)
            | DirectoryError::NotReady { .. }
            | DirectoryError::AlreadyExists(_)
            | DirectoryError::AlreadyRegistered(_)
            | DirectoryError::Overflow
            | DirectoryError::LimitExceeded { .. }
            | DirectoryError::Reentrant => ErrorClass::StateConsistency,

            DirectoryError::IntegrityViolation(_)
            | DirectoryError::MigrationFailed(_)
            | DirectoryError::Storage(_)
            | DirectoryError::Config(_) => ErrorClass::Internal,
        }
    }

    /// Stable error code for logs and CLI output
    pub fn code(&self) -> &'static str {
        match self {
            DirectoryError::InvalidIdentifier => "MODDIR_INVALID_IDENTIFIER",
            DirectoryError::NullIdentity(_) => "MODDIR_NULL_IDENTITY",
            DirectoryError::InvalidName(_) => "MODDIR_INVALID_NAME",
            DirectoryError::LengthMismatch { .. } => "MODDIR_LENGTH_MISMATCH",
            DirectoryError::BatchTooLarge { .. } => "MODDIR_BATCH_TOO_LARGE",
            DirectoryError::IndexOutOfBounds { .. } => "MODDIR_INDEX_OUT_OF_BOUNDS",
            DirectoryError::InvalidHex(_) => "MODDIR_INVALID_HEX",
            DirectoryError::InvalidTarget { .. } => "MODDIR_INVALID_TARGET",
            DirectoryError::MissingRole { .. } => "MODDIR_MISSING_ROLE",
            DirectoryError::NotPendingOwner(_) => "MODDIR_NOT_PENDING_OWNER",
            DirectoryError::InvalidSignature(_) => "MODDIR_INVALID_SIGNATURE",
            DirectoryError::InvalidNonce { .. } => "MODDIR_INVALID_NONCE",
            DirectoryError::Expired { .. } => "MODDIR_EXPIRED",
            DirectoryError::Paused => "MODDIR_PAUSED",
            DirectoryError::VersionMismatch { .. } => "MODDIR_VERSION_MISMATCH",
            DirectoryError::NotFound(_) => "MODDIR_NOT_FOUND",
            DirectoryError::NotReady { .. } => "MODDIR_NOT_READY",
            DirectoryError::AlreadyExists(_) => "MODDIR_ALREADY_EXISTS",
            DirectoryError::AlreadyRegistered(_) => "MODDIR_ALREADY_REGISTERED",
            DirectoryError::Overflow => "MODDIR_OVERFLOW",
            DirectoryError::LimitExceeded { .. } => "MODDIR_LIMIT_EXCEEDED",
            DirectoryError::Reentrant => "MODDIR_REENTRANT",
            DirectoryError::IntegrityViolation(_) => "MODDIR_INTEGRITY_VIOLATION",
            DirectoryError::MigrationFailed(_) => "MODDIR_MIGRATION_FAILED",
            DirectoryError::Storage(_) => "MODDIR_STORAGE",
            DirectoryError::Config(_) => "MODDIR_CONFIG",
        }
    }

    /// Returns true if the caller should refresh state and may then retry
    pub fn is_retryable_after_refresh(&self) -> bool {
        self.class() == ErrorClass::StateConsistency
    }

    /// Shorthand for a missing-role error
    pub fn missing_role(action: impl Into<String>, identity: Identity) -> Self {
        DirectoryError::MissingRole {
            action: action.into(),
            identity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert_eq!(DirectoryError::InvalidIdentifier.class(), ErrorClass::InputValidation);
        assert_eq!(DirectoryError::Paused.class(), ErrorClass::Authorization);
        assert_eq!(
            DirectoryError::VersionMismatch { expected: 1, actual: 2 }.class(),
            ErrorClass::StateConsistency
        );
        assert_eq!(
            DirectoryError::Storage("disk".into()).class(),
            ErrorClass::Internal
        );
    }

    #[test]
    fn test_only_state_errors_are_retryable() {
        assert!(DirectoryError::NotReady { execute_after: 10, now: 5 }.is_retryable_after_refresh());
        assert!(!DirectoryError::InvalidSignature("bad v").is_retryable_after_refresh());
        assert!(!DirectoryError::BatchTooLarge { size: 51, max: 50 }.is_retryable_after_refresh());
    }

    #[test]
    fn test_codes_are_prefixed() {
        let errors = [
            DirectoryError::InvalidIdentifier,
            DirectoryError::Paused,
            DirectoryError::Overflow,
            DirectoryError::Reentrant,
            DirectoryError::missing_role("DIRECTORY_ADMIN", Identity::zero()),
        ];
        for err in errors {
            assert!(err.code().starts_with("MODDIR_"));
        }
    }

    #[test]
    fn test_display_includes_values() {
        let err = DirectoryError::InvalidNonce {
            signer: Identity::from_low_u64(7),
            expected: 3,
            got: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains("expected 3"));
        assert!(msg.contains("got 4"));
    }
}
