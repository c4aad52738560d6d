//! Fixed-size value types shared by every subsystem
//!
//! - `Key`: 32-byte symbolic slot name (SHA-256 of a human-readable name)
//! - `Identifier`: 20-byte opaque reference to the component occupying a slot
//! - `Identity`: 20-byte caller / signer identity
//!
//! All three render as `0x`-prefixed lowercase hex and serialize as hex
//! strings so they can be used as JSON map keys in the persisted layout.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::errors::DirectoryError;

macro_rules! fixed_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// Width in bytes.
            pub const LEN: usize = $len;

            /// The null value.
            pub const fn zero() -> Self {
                Self([0u8; $len])
            }

            /// Returns true for the null value.
            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }

            /// Raw bytes.
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Parse from hex, with or without a `0x` prefix.
            pub fn from_hex(s: &str) -> Result<Self, DirectoryError> {
                let digits = s.trim();
                let digits = digits.strip_prefix("0x").unwrap_or(digits);
                let bytes = hex::decode(digits).map_err(|e| {
                    DirectoryError::InvalidHex(format!("{}: {}", stringify!($name), e))
                })?;
                let len = bytes.len();
                let arr: [u8; $len] = bytes.try_into().map_err(|_| {
                    DirectoryError::InvalidHex(format!(
                        "{}: expected {} bytes, got {}",
                        stringify!($name),
                        $len,
                        len
                    ))
                })?;
                Ok(Self(arr))
            }

            /// `0x`-prefixed lowercase hex.
            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = DirectoryError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

fixed_bytes!(
    /// Symbolic module slot.
    Key,
    32
);

fixed_bytes!(
    /// Opaque endpoint reference stored under a key.
    Identifier,
    20
);

fixed_bytes!(
    /// Caller or signer identity.
    Identity,
    20
);

impl Key {
    /// Derive a key from a human-readable name.
    ///
    /// The name is hashed exactly as given; callers normalize first when needed.
    pub fn from_name(name: &str) -> Self {
        let digest = Sha256::digest(name.as_bytes());
        Self(digest.into())
    }
}

impl Identifier {
    /// Build an identifier whose last byte is `n`. Handy for fixtures and demos.
    pub fn from_low_u64(n: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&n.to_be_bytes());
        Self(bytes)
    }
}

impl Identity {
    /// Build an identity whose low bytes are `n`.
    pub fn from_low_u64(n: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&n.to_be_bytes());
        Self(bytes)
    }
}
