//! Signature-based permits
//!
//! A permit lets the holder of a private credential authorize a single or
//! batched directory change that anyone may submit. Redemption:
//!
//! 1. reject if the deadline has passed
//! 2. rebuild the domain-bound digest
//! 3. range-check the signature, then recover the signer
//! 4. require the supplied nonce to equal the signer's counter
//! 5. require the signer to hold directory-admin authority
//! 6. consume the nonce, then commit as the signer
//!
//! Nothing is written unless every step passes, so a rejected permit never
//! burns a nonce.

mod authorizer;
mod digest;
mod signature;

pub use authorizer::PermitOutcome;
pub use digest::{
    type_hash, typed_digest, DomainCache, DomainParams, PermitPayload, SetModuleBatchPermit,
    SetModulePermit, DOMAIN_TYPE, SET_MODULE_BATCH_TYPE, SET_MODULE_TYPE,
};
pub use signature::{identity_from_public_key, PermitSignature, PermitSigner};
