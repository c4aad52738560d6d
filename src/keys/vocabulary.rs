//! Fixed key vocabulary

use crate::types::Key;

/// Names of the module slots every deployment knows about.
pub const FIXED_KEY_NAMES: &[&str] = &[
    "LENDING_ENGINE",
    "COLLATERAL_MANAGER",
    "LIQUIDATION_ENGINE",
    "INTEREST_RATE_MODEL",
    "PRICE_ORACLE",
    "NFT_VAULT",
    "REWARD_MANAGER",
    "FEE_COLLECTOR",
    "TREASURY",
    "ACCESS_CONTROL",
    "GUARANTEE_POOL",
    "VAULT_ROUTER",
];

/// All fixed keys paired with their names, in declaration order.
pub fn fixed_keys() -> Vec<(&'static str, Key)> {
    FIXED_KEY_NAMES
        .iter()
        .map(|name| (*name, Key::from_name(name)))
        .collect()
}

/// Key for a fixed name, if the name belongs to the vocabulary.
pub fn fixed_key(name: &str) -> Option<Key> {
    FIXED_KEY_NAMES
        .iter()
        .find(|n| **n == name)
        .map(|n| Key::from_name(n))
}

/// Reverse lookup.
pub fn fixed_name_of(key: &Key) -> Option<&'static str> {
    FIXED_KEY_NAMES
        .iter()
        .copied()
        .find(|name| Key::from_name(name) == *key)
}

pub fn is_fixed_key(key: &Key) -> bool {
    fixed_name_of(key).is_some()
}
