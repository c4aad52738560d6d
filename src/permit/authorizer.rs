//! Permit redemption on the directory

use serde::Serialize;

use super::digest::{typed_digest, PermitPayload, SetModuleBatchPermit, SetModulePermit};
use super::signature::PermitSignature;
use crate::directory::{commit_batch, commit_single, BatchOutcome, Directory, SetOutcome, Txn};
use crate::errors::{DirectoryError, DirectoryResult};
use crate::observability::DirectoryEvent;
use crate::types::Identity;

/// Result of a redeemed permit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermitOutcome<T> {
    /// Recovered signer; the change is attributed to it
    pub signer: Identity,
    /// Nonce consumed by this permit
    pub nonce: u64,
    pub outcome: T,
}

/// Checks every permit kind shares, up to and including nonce consumption.
fn authorize<P: PermitPayload>(
    txn: &mut Txn<'_>,
    relayer: Identity,
    payload: &P,
    signature: &PermitSignature,
    digest: &[u8; 32],
) -> DirectoryResult<Identity> {
    txn.require_unpaused()?;
    txn.require_version()?;

    if txn.now > payload.deadline() {
        return Err(DirectoryError::Expired {
            deadline: payload.deadline(),
            now: txn.now,
        });
    }

    let signer = signature.recover(digest)?;

    let expected = txn.layout.nonce(&signer);
    if payload.nonce() != expected {
        return Err(DirectoryError::InvalidNonce {
            signer,
            expected,
            got: payload.nonce(),
        });
    }

    txn.require_admin(&signer)?;

    let next = expected.checked_add(1).ok_or(DirectoryError::Overflow)?;
    txn.layout.nonces.insert(signer, next);
    txn.emit(DirectoryEvent::PermitConsumed {
        signer,
        nonce: expected,
        relayer,
        timestamp: txn.now,
    });
    Ok(signer)
}

impl Directory {
    /// Domain separator for the live network.
    pub fn domain_separator(&self) -> [u8; 32] {
        self.domain.separator(self.env.network_id())
    }

    /// Digest a signer must sign to authorize `payload` on the live network.
    pub fn permit_digest<P: PermitPayload>(&self, payload: &P) -> [u8; 32] {
        typed_digest(&self.domain_separator(), &payload.struct_hash())
    }

    /// Next nonce `signer` must use.
    pub fn nonce_of(&self, signer: &Identity) -> u64 {
        self.layout.nonce(signer)
    }

    /// Redeem a single-change permit submitted by `relayer`.
    pub fn permit_set(
        &mut self,
        relayer: Identity,
        permit: &SetModulePermit,
        signature: &PermitSignature,
    ) -> DirectoryResult<PermitOutcome<SetOutcome>> {
        let _token = self.guard.enter()?;
        let digest = self.permit_digest(permit);

        self.transact("permit_set", |txn| {
            let signer = authorize(txn, relayer, permit, signature, &digest)?;
            let outcome = commit_single(
                txn,
                signer,
                permit.key,
                permit.new_identifier,
                permit.allow_replace,
            )?;
            Ok(PermitOutcome {
                signer,
                nonce: permit.nonce,
                outcome,
            })
        })
    }

    /// Redeem a batch permit submitted by `relayer`.
    pub fn permit_set_batch(
        &mut self,
        relayer: Identity,
        permit: &SetModuleBatchPermit,
        signature: &PermitSignature,
    ) -> DirectoryResult<PermitOutcome<BatchOutcome>> {
        let _token = self.guard.enter()?;
        let digest = self.permit_digest(permit);

        self.transact("permit_set_batch", |txn| {
            let signer = authorize(txn, relayer, permit, signature, &digest)?;
            let outcome = commit_batch(
                txn,
                signer,
                &permit.keys,
                &permit.identifiers,
                permit.allow_replace,
            )?;
            Ok(PermitOutcome {
                signer,
                nonce: permit.nonce,
                outcome,
            })
        })
    }
}
