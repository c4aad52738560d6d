//! Recoverable secp256k1 permit signatures
//!
//! Wire form is 65 bytes: r (32) || s (32) || v (1), with v in {27, 28}.
//! Components are range-checked before recovery is attempted; high-s
//! signatures are rejected so each permit has exactly one valid encoding.

use std::fmt;

use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::errors::{DirectoryError, DirectoryResult};
use crate::types::Identity;

/// secp256k1 group order n
const CURVE_ORDER: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe,
    0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36, 0x41, 0x41,
];

/// floor(n / 2)
const HALF_CURVE_ORDER: [u8; 32] = [
    0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0x5d, 0x57, 0x6e, 0x73, 0x57, 0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46, 0x68, 0x1b, 0x20, 0xa0,
];

/// A permit signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PermitSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub v: u8,
}

impl PermitSignature {
    /// r || s || v
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.v;
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> DirectoryResult<Self> {
        if bytes.len() != 65 {
            return Err(DirectoryError::InvalidSignature("signature must be 65 bytes"));
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Ok(Self { r, s, v: bytes[64] })
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }

    pub fn from_hex(s: &str) -> DirectoryResult<Self> {
        let digits = s.trim();
        let digits = digits.strip_prefix("0x").unwrap_or(digits);
        let bytes = hex::decode(digits)
            .map_err(|e| DirectoryError::InvalidHex(format!("signature: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Range checks that must pass before recovery.
    pub fn check_components(&self) -> DirectoryResult<()> {
        if self.v != 27 && self.v != 28 {
            return Err(DirectoryError::InvalidSignature("recovery flag must be 27 or 28"));
        }
        if self.r == [0u8; 32] || self.r >= CURVE_ORDER {
            return Err(DirectoryError::InvalidSignature("r out of range"));
        }
        if self.s == [0u8; 32] || self.s > HALF_CURVE_ORDER {
            return Err(DirectoryError::InvalidSignature("s out of range"));
        }
        Ok(())
    }

    /// Recover the signer of `digest`.
    pub fn recover(&self, digest: &[u8; 32]) -> DirectoryResult<Identity> {
        self.check_components()?;

        let recovery_id = RecoveryId::from_i32(i32::from(self.v - 27))
            .map_err(|_| DirectoryError::InvalidSignature("recovery flag must be 27 or 28"))?;
        let mut compact = [0u8; 64];
        compact[..32].copy_from_slice(&self.r);
        compact[32..].copy_from_slice(&self.s);
        let signature = RecoverableSignature::from_compact(&compact, recovery_id)
            .map_err(|_| DirectoryError::InvalidSignature("malformed signature"))?;

        let secp = Secp256k1::verification_only();
        let public_key = secp
            .recover_ecdsa(&Message::from_digest(*digest), &signature)
            .map_err(|_| DirectoryError::InvalidSignature("signature does not recover"))?;

        let identity = identity_from_public_key(&public_key);
        if identity.is_zero() {
            return Err(DirectoryError::InvalidSignature("recovered null signer"));
        }
        Ok(identity)
    }
}

impl fmt::Debug for PermitSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PermitSignature({})", self.to_hex())
    }
}

impl Serialize for PermitSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PermitSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Identity of a public key: last 20 bytes of SHA-256 over the
/// uncompressed point without its prefix byte.
pub fn identity_from_public_key(public_key: &PublicKey) -> Identity {
    let uncompressed = public_key.serialize_uncompressed();
    let digest = Sha256::digest(&uncompressed[1..]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest[12..]);
    Identity(bytes)
}

/// Holder of a private credential able to sign permits.
pub struct PermitSigner {
    secret: SecretKey,
    identity: Identity,
}

impl PermitSigner {
    pub fn from_secret_bytes(bytes: &[u8]) -> DirectoryResult<Self> {
        let secret = SecretKey::from_slice(bytes)
            .map_err(|e| DirectoryError::InvalidHex(format!("secret key: {}", e)))?;
        let secp = Secp256k1::signing_only();
        let identity = identity_from_public_key(&PublicKey::from_secret_key(&secp, &secret));
        Ok(Self { secret, identity })
    }

    pub fn from_hex(s: &str) -> DirectoryResult<Self> {
        let digits = s.trim();
        let digits = digits.strip_prefix("0x").unwrap_or(digits);
        let bytes = hex::decode(digits)
            .map_err(|e| DirectoryError::InvalidHex(format!("secret key: {}", e)))?;
        Self::from_secret_bytes(&bytes)
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    /// Sign a 32-byte digest. libsecp256k1 always produces low-s.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> PermitSignature {
        let secp = Secp256k1::signing_only();
        let signature = secp.sign_ecdsa_recoverable(&Message::from_digest(*digest), &self.secret);
        let (recovery_id, compact) = signature.serialize_compact();

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&compact[..32]);
        s.copy_from_slice(&compact[32..]);
        PermitSignature {
            r,
            s,
            v: 27 + recovery_id.to_i32() as u8,
        }
    }
}

impl fmt::Debug for PermitSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermitSigner")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}
