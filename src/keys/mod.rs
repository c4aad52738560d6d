//! Key vocabulary
//!
//! Keys come from two places that share one directory map:
//!
//! - a small fixed vocabulary compiled into the logic
//! - dynamic keys minted at runtime through the registrar, bounded in
//!   count and restricted to normalized lowercase names
//!
//! The union of both is the "known vocabulary" swept by
//! `Directory::emergency_cancel_all`.

mod registry;
mod vocabulary;

pub use registry::{normalize_name, DynamicKey, DynamicKeyRegistry, KeyLimits};
pub use vocabulary::{fixed_key, fixed_keys, fixed_name_of, is_fixed_key, FIXED_KEY_NAMES};
