//! Typed, domain-bound permit digests
//!
//! digest = SHA-256(0x19 || 0x01 || domainSeparator || structHash)
//!
//! The domain separator binds the directory name, its version string, the
//! network identity and the verifying identity, so a permit signed for one
//! deployment cannot be replayed against another. All words are 32 bytes,
//! big-endian, left-padded.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::{Identifier, Identity, Key};

/// Domain type string
pub const DOMAIN_TYPE: &str =
    "DirectoryDomain(string name,string version,uint256 networkId,address verifyingIdentity)";

/// Single-change permit type string
pub const SET_MODULE_TYPE: &str =
    "SetModule(bytes32 key,address newIdentifier,bool allowReplace,uint256 nonce,uint256 deadline)";

/// Batch permit type string
pub const SET_MODULE_BATCH_TYPE: &str =
    "SetModuleBatch(bytes32[] keys,address[] identifiers,bool allowReplace,uint256 nonce,uint256 deadline)";

/// SHA-256 of a type string.
pub fn type_hash(type_string: &str) -> [u8; 32] {
    Sha256::digest(type_string.as_bytes()).into()
}

fn word_u64(v: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&v.to_be_bytes());
    word
}

fn word_bytes20(bytes: &[u8; 20]) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(bytes);
    word
}

fn word_bool(b: bool) -> [u8; 32] {
    word_u64(u64::from(b))
}

fn hash_words(words: &[[u8; 32]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for word in words {
        hasher.update(word);
    }
    hasher.finalize().into()
}

/// Static part of the signing domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainParams {
    pub name: String,
    pub version: String,
    pub verifying_identity: Identity,
}

impl DomainParams {
    /// Separator for `network_id`.
    pub fn separator(&self, network_id: u64) -> [u8; 32] {
        hash_words(&[
            type_hash(DOMAIN_TYPE),
            Sha256::digest(self.name.as_bytes()).into(),
            Sha256::digest(self.version.as_bytes()).into(),
            word_u64(network_id),
            word_bytes20(self.verifying_identity.as_bytes()),
        ])
    }
}

/// Domain separator cached for the network it was built on.
///
/// If the live network differs from the cached one, the separator is
/// recomputed for the live network on every call.
#[derive(Debug, Clone)]
pub struct DomainCache {
    params: DomainParams,
    cached_network_id: u64,
    cached_separator: [u8; 32],
}

impl DomainCache {
    pub fn new(params: DomainParams, network_id: u64) -> Self {
        let cached_separator = params.separator(network_id);
        Self {
            params,
            cached_network_id: network_id,
            cached_separator,
        }
    }

    pub fn separator(&self, live_network_id: u64) -> [u8; 32] {
        if live_network_id == self.cached_network_id {
            self.cached_separator
        } else {
            self.params.separator(live_network_id)
        }
    }

    pub fn cached_network_id(&self) -> u64 {
        self.cached_network_id
    }

    pub fn params(&self) -> &DomainParams {
        &self.params
    }
}

/// Fields shared by every permit kind.
pub trait PermitPayload {
    fn struct_hash(&self) -> [u8; 32];
    fn nonce(&self) -> u64;
    fn deadline(&self) -> u64;
}

/// Signed authorization for one directory change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetModulePermit {
    pub key: Key,
    pub new_identifier: Identifier,
    pub allow_replace: bool,
    pub nonce: u64,
    pub deadline: u64,
}

impl PermitPayload for SetModulePermit {
    fn struct_hash(&self) -> [u8; 32] {
        hash_words(&[
            type_hash(SET_MODULE_TYPE),
            *self.key.as_bytes(),
            word_bytes20(self.new_identifier.as_bytes()),
            word_bool(self.allow_replace),
            word_u64(self.nonce),
            word_u64(self.deadline),
        ])
    }

    fn nonce(&self) -> u64 {
        self.nonce
    }

    fn deadline(&self) -> u64 {
        self.deadline
    }
}

/// Signed authorization for a batch of directory changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetModuleBatchPermit {
    pub keys: Vec<Key>,
    pub identifiers: Vec<Identifier>,
    pub allow_replace: bool,
    pub nonce: u64,
    pub deadline: u64,
}

impl PermitPayload for SetModuleBatchPermit {
    fn struct_hash(&self) -> [u8; 32] {
        let keys: Vec<[u8; 32]> = self.keys.iter().map(|k| *k.as_bytes()).collect();
        let identifiers: Vec<[u8; 32]> = self
            .identifiers
            .iter()
            .map(|id| word_bytes20(id.as_bytes()))
            .collect();
        hash_words(&[
            type_hash(SET_MODULE_BATCH_TYPE),
            hash_words(&keys),
            hash_words(&identifiers),
            word_bool(self.allow_replace),
            word_u64(self.nonce),
            word_u64(self.deadline),
        ])
    }

    fn nonce(&self) -> u64 {
        self.nonce
    }

    fn deadline(&self) -> u64 {
        self.deadline
    }
}

/// Final digest that gets signed.
pub fn typed_digest(domain_separator: &[u8; 32], struct_hash: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([0x19, 0x01]);
    hasher.update(domain_separator);
    hasher.update(struct_hash);
    hasher.finalize().into()
}
