//! Dynamic key registry
//!
//! Registered keys live in a dense vector. A key → (index + 1) map gives
//! O(1) membership and O(1) removal via swap-and-pop; zero is never a valid
//! slot, so a missing map entry and "not registered" coincide.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::vocabulary::{is_fixed_key, FIXED_KEY_NAMES};
use crate::errors::{DirectoryError, DirectoryResult};
use crate::types::{Identity, Key};

/// Bounds applied to dynamic key registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyLimits {
    /// Maximum number of dynamic keys
    pub max_keys: usize,
    /// Minimum normalized name length
    pub min_len: usize,
    /// Maximum normalized name length
    pub max_len: usize,
}

impl Default for KeyLimits {
    fn default() -> Self {
        Self {
            max_keys: 100,
            min_len: 1,
            max_len: 32,
        }
    }
}

/// A key minted at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicKey {
    pub key: Key,
    pub name: String,
    pub registered_at: u64,
    pub registrar: Identity,
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9_-]+$").expect("static pattern compiles"))
}

/// Trim, lowercase and validate a raw key name.
pub fn normalize_name(raw: &str, limits: &KeyLimits) -> DirectoryResult<String> {
    let name = raw.trim().to_lowercase();
    let len = name.chars().count();

    if len < limits.min_len || len > limits.max_len {
        return Err(DirectoryError::InvalidName(format!(
            "length {} outside {}..={}",
            len, limits.min_len, limits.max_len
        )));
    }

    if !name_pattern().is_match(&name) {
        return Err(DirectoryError::InvalidName(format!(
            "'{}' contains characters outside [a-z0-9_-]",
            name
        )));
    }

    Ok(name)
}

/// Runtime-minted keys, persisted inside the layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicKeyRegistry {
    entries: Vec<DynamicKey>,
    index_plus_one: BTreeMap<Key, usize>,
    names: BTreeMap<String, Key>,
}

impl DynamicKeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a key for `raw_name`.
    pub fn register(
        &mut self,
        raw_name: &str,
        limits: &KeyLimits,
        registrar: Identity,
        now: u64,
    ) -> DirectoryResult<DynamicKey> {
        let name = normalize_name(raw_name, limits)?;

        if self.names.contains_key(&name) {
            return Err(DirectoryError::AlreadyExists(format!("key name '{}'", name)));
        }

        // A dynamic name must not shadow a fixed slot under a different case.
        let upper = name.to_uppercase();
        if FIXED_KEY_NAMES.iter().any(|fixed| *fixed == upper) {
            return Err(DirectoryError::AlreadyExists(format!(
                "key name '{}' is reserved",
                name
            )));
        }

        let key = Key::from_name(&name);
        if self.index_plus_one.contains_key(&key) || is_fixed_key(&key) {
            return Err(DirectoryError::AlreadyExists(format!("key {}", key)));
        }

        if self.entries.len() >= limits.max_keys {
            return Err(DirectoryError::LimitExceeded {
                max: limits.max_keys,
            });
        }

        let entry = DynamicKey {
            key,
            name: name.clone(),
            registered_at: now,
            registrar,
        };
        self.entries.push(entry.clone());
        self.index_plus_one.insert(key, self.entries.len());
        self.names.insert(name, key);
        Ok(entry)
    }

    /// Remove a key, moving the last entry into its slot.
    pub fn unregister(&mut self, key: &Key) -> DirectoryResult<DynamicKey> {
        let slot = self
            .index_plus_one
            .remove(key)
            .ok_or_else(|| DirectoryError::NotFound(format!("dynamic key {}", key)))?;
        let index = slot - 1;

        let removed = self.entries.swap_remove(index);
        if let Some(moved) = self.entries.get(index) {
            self.index_plus_one.insert(moved.key, index + 1);
        }
        self.names.remove(&removed.name);
        Ok(removed)
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.index_plus_one.contains_key(key)
    }

    pub fn get(&self, key: &Key) -> Option<&DynamicKey> {
        self.index_plus_one
            .get(key)
            .and_then(|slot| self.entries.get(slot - 1))
    }

    pub fn key_for_name(&self, raw_name: &str) -> Option<Key> {
        self.names.get(&raw_name.trim().to_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered keys in slot order. Slot order changes on removal.
    pub fn entries(&self) -> &[DynamicKey] {
        &self.entries
    }

    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.entries.iter().map(|e| e.key)
    }

    /// Verify the three indexes agree with each other.
    pub fn check_integrity(&self) -> Result<(), String> {
        if self.index_plus_one.len() != self.entries.len() || self.names.len() != self.entries.len() {
            return Err(format!(
                "dynamic key index sizes disagree: {} entries, {} slots, {} names",
                self.entries.len(),
                self.index_plus_one.len(),
                self.names.len()
            ));
        }
        for (i, entry) in self.entries.iter().enumerate() {
            if self.index_plus_one.get(&entry.key) != Some(&(i + 1)) {
                return Err(format!("dynamic key {} has a stale slot", entry.key));
            }
            if self.names.get(&entry.name) != Some(&entry.key) {
                return Err(format!("dynamic key name '{}' is not indexed", entry.name));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registrar() -> Identity {
        Identity::from_low_u64(9)
    }

    #[test]
    fn test_normalize_trims_and_lowercases() {
        let limits = KeyLimits::default();
        assert_eq!(normalize_name("  Bridge_Adapter-2 ", &limits).unwrap(), "bridge_adapter-2");
    }

    #[test]
    fn test_normalize_rejects_bad_charset_and_length() {
        let limits = KeyLimits::default();
        assert!(matches!(normalize_name("has space", &limits), Err(DirectoryError::InvalidName(_))));
        assert!(matches!(normalize_name("dot.name", &limits), Err(DirectoryError::InvalidName(_))));
        assert!(matches!(normalize_name("   ", &limits), Err(DirectoryError::InvalidName(_))));
        let long = "a".repeat(33);
        assert!(matches!(normalize_name(&long, &limits), Err(DirectoryError::InvalidName(_))));
        assert!(normalize_name(&"a".repeat(32), &limits).is_ok());
    }

    #[test]
    fn test_register_duplicate_after_normalization() {
        let mut reg = DynamicKeyRegistry::new();
        let limits = KeyLimits::default();
        reg.register("bridge", &limits, registrar(), 1).unwrap();
        let err = reg.register("  BRIDGE ", &limits, registrar(), 2).unwrap_err();
        assert!(matches!(err, DirectoryError::AlreadyExists(_)));
    }

    #[test]
    fn test_register_rejects_fixed_name_shadow() {
        let mut reg = DynamicKeyRegistry::new();
        let err = reg
            .register("lending_engine", &KeyLimits::default(), registrar(), 1)
            .unwrap_err();
        assert!(matches!(err, DirectoryError::AlreadyExists(_)));
    }

    #[test]
    fn test_register_limit() {
        let mut reg = DynamicKeyRegistry::new();
        let limits = KeyLimits {
            max_keys: 2,
            ..KeyLimits::default()
        };
        reg.register("a", &limits, registrar(), 1).unwrap();
        reg.register("b", &limits, registrar(), 1).unwrap();
        let err = reg.register("c", &limits, registrar(), 1).unwrap_err();
        assert_eq!(err, DirectoryError::LimitExceeded { max: 2 });
    }

    #[test]
    fn test_swap_and_pop_keeps_indexes_consistent() {
        let mut reg = DynamicKeyRegistry::new();
        let limits = KeyLimits::default();
        let a = reg.register("a", &limits, registrar(), 1).unwrap().key;
        let b = reg.register("b", &limits, registrar(), 1).unwrap().key;
        let c = reg.register("c", &limits, registrar(), 1).unwrap().key;

        reg.unregister(&a).unwrap();

        assert!(!reg.contains(&a));
        assert!(reg.contains(&b));
        assert!(reg.contains(&c));
        // c moved into slot 0
        assert_eq!(reg.entries()[0].key, c);
        assert_eq!(reg.get(&c).unwrap().name, "c");
        assert!(reg.check_integrity().is_ok());

        // name is free again
        reg.register("a", &limits, registrar(), 2).unwrap();
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn test_unregister_missing() {
        let mut reg = DynamicKeyRegistry::new();
        let err = reg.unregister(&Key::from_name("nope")).unwrap_err();
        assert!(matches!(err, DirectoryError::NotFound(_)));
    }

    #[test]
    fn test_key_for_name() {
        let mut reg = DynamicKeyRegistry::new();
        let entry = reg.register("Bridge", &KeyLimits::default(), registrar(), 1).unwrap();
        assert_eq!(reg.key_for_name(" BRIDGE"), Some(entry.key));
        assert_eq!(entry.key, Key::from_name("bridge"));
    }
}
