//! Directory configuration

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{DirectoryError, DirectoryResult};
use crate::keys::KeyLimits;
use crate::permit::DomainParams;
use crate::store::DEFAULT_HISTORY_CAPACITY;
use crate::types::{Identity, Key};

/// Static parameters of a directory deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Name bound into the permit domain
    #[serde(default = "default_name")]
    pub name: String,

    /// Version string bound into the permit domain
    #[serde(default = "default_version_string")]
    pub version_string: String,

    /// Network identity at deployment time
    #[serde(default = "default_network_id")]
    pub network_id: u64,

    /// Identity of this directory as a permit verifier
    #[serde(default = "default_verifying_identity")]
    pub verifying_identity: Identity,

    /// Layout version the running logic operates on
    #[serde(default = "default_layout_version")]
    pub expected_layout_version: u64,

    /// Per-key history ring capacity
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Maximum items per batch
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Maximum dynamic keys
    #[serde(default = "default_max_dynamic_keys")]
    pub max_dynamic_keys: usize,

    #[serde(default = "default_name_min_len")]
    pub name_min_len: usize,

    #[serde(default = "default_name_max_len")]
    pub name_max_len: usize,
}

fn default_name() -> String {
    "ModuleDirectory".to_string()
}
fn default_version_string() -> String {
    "1".to_string()
}
fn default_network_id() -> u64 {
    1
}
fn default_verifying_identity() -> Identity {
    derive_identity(&default_name())
}
fn default_layout_version() -> u64 {
    1
}
fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}
fn default_max_batch_size() -> usize {
    50
}
fn default_max_dynamic_keys() -> usize {
    100
}
fn default_name_min_len() -> usize {
    1
}
fn default_name_max_len() -> usize {
    32
}

/// Deterministic identity derived from a label.
pub fn derive_identity(label: &str) -> Identity {
    let key = Key::from_name(label);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&key.as_bytes()[12..]);
    Identity(bytes)
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            version_string: default_version_string(),
            network_id: default_network_id(),
            verifying_identity: default_verifying_identity(),
            expected_layout_version: default_layout_version(),
            history_capacity: default_history_capacity(),
            max_batch_size: default_max_batch_size(),
            max_dynamic_keys: default_max_dynamic_keys(),
            name_min_len: default_name_min_len(),
            name_max_len: default_name_max_len(),
        }
    }
}

impl DirectoryConfig {
    /// Load from a JSON file and validate.
    pub fn load(path: &Path) -> DirectoryResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| DirectoryError::Config(format!("failed to read config: {}", e)))?;
        let config: DirectoryConfig = serde_json::from_str(&content)
            .map_err(|e| DirectoryError::Config(format!("invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DirectoryResult<()> {
        if self.name.trim().is_empty() {
            return Err(DirectoryError::Config("name must not be empty".into()));
        }
        if self.expected_layout_version == 0 {
            return Err(DirectoryError::Config("expected_layout_version must be > 0".into()));
        }
        if self.history_capacity == 0 {
            return Err(DirectoryError::Config("history_capacity must be > 0".into()));
        }
        if self.max_batch_size == 0 {
            return Err(DirectoryError::Config("max_batch_size must be > 0".into()));
        }
        if self.name_min_len == 0 || self.name_min_len > self.name_max_len {
            return Err(DirectoryError::Config(format!(
                "invalid name bounds {}..={}",
                self.name_min_len, self.name_max_len
            )));
        }
        if self.verifying_identity.is_zero() {
            return Err(DirectoryError::Config("verifying_identity must not be null".into()));
        }
        Ok(())
    }

    pub fn key_limits(&self) -> KeyLimits {
        KeyLimits {
            max_keys: self.max_dynamic_keys,
            min_len: self.name_min_len,
            max_len: self.name_max_len,
        }
    }

    pub fn domain_params(&self) -> DomainParams {
        DomainParams {
            name: self.name.clone(),
            version: self.version_string.clone(),
            verifying_identity: self.verifying_identity,
        }
    }
}
