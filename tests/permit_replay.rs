//! Permit Replay Protection Tests
//!
//! Test Categories:
//! 1. Nonce monotonicity and replay rejection
//! 2. Signature component checks
//! 3. Domain binding
//! 4. Attribution to the signer

use std::sync::Arc;

use moduledir::env::ManualEnvironment;
use moduledir::governance::{Role, StaticAccessControl};
use moduledir::history::HistoryLedger;
use moduledir::keys::fixed_key;
use moduledir::observability::{DirectoryEvent, MemoryEventSink};
use moduledir::permit::{PermitSignature, PermitSigner, SetModuleBatchPermit, SetModulePermit};
use moduledir::{
    Collaborators, Directory, DirectoryConfig, DirectoryError, Identifier, Identity, InitParams,
};

const NOW: u64 = 50_000;

fn signer() -> PermitSigner {
    PermitSigner::from_secret_bytes(&[0x42; 32]).unwrap()
}

fn relayer() -> Identity {
    Identity::from_low_u64(0xfeed)
}

fn directory_for(
    config: DirectoryConfig,
    admin: Identity,
) -> (Directory, ManualEnvironment, MemoryEventSink) {
    let env = ManualEnvironment::new(NOW, config.network_id);
    let sink = MemoryEventSink::new();
    let access = StaticAccessControl::new().grant(Role::DirectoryAdmin, admin);
    let collaborators = Collaborators::new(Arc::new(env.clone()), Arc::new(access))
        .with_events(Arc::new(sink.clone()));
    let params = InitParams {
        owner: Identity::from_low_u64(1),
        emergency: Identity::from_low_u64(2),
        upgrader: Identity::from_low_u64(3),
        min_delay: 0,
    };
    let dir = Directory::initialize(config, params, collaborators).unwrap();
    (dir, env, sink)
}

fn directory() -> (Directory, ManualEnvironment, MemoryEventSink) {
    directory_for(DirectoryConfig::default(), signer().identity())
}

fn permit(nonce: u64, id: u64) -> SetModulePermit {
    SetModulePermit {
        key: fixed_key("INTEREST_RATE_MODEL").unwrap(),
        new_identifier: Identifier::from_low_u64(id),
        allow_replace: true,
        nonce,
        deadline: NOW + 600,
    }
}

// =============================================================================
// NONCE MONOTONICITY
// =============================================================================

/// Test: Nonces are consumed strictly in order, one per redeemed permit.
#[test]
fn test_nonces_consumed_in_order() {
    let (mut dir, _, _) = directory();
    let s = signer();

    for nonce in 0..5 {
        assert_eq!(dir.nonce_of(&s.identity()), nonce);
        let p = permit(nonce, nonce + 1);
        let sig = s.sign_digest(&dir.permit_digest(&p));
        let result = dir.permit_set(relayer(), &p, &sig).unwrap();
        assert_eq!(result.nonce, nonce);
    }
    assert_eq!(dir.nonce_of(&s.identity()), 5);
}

/// Test: Replaying a redeemed permit fails and leaves the counter alone.
#[test]
fn test_replay_rejected() {
    let (mut dir, _, sink) = directory();
    let s = signer();
    let p = permit(0, 1);
    let sig = s.sign_digest(&dir.permit_digest(&p));
    dir.permit_set(relayer(), &p, &sig).unwrap();
    sink.clear();

    let err = dir.permit_set(relayer(), &p, &sig).unwrap_err();
    assert_eq!(
        err,
        DirectoryError::InvalidNonce {
            signer: s.identity(),
            expected: 1,
            got: 0
        }
    );
    assert_eq!(dir.nonce_of(&s.identity()), 1);
    assert!(sink.is_empty());

    // the next nonce is still redeemable
    let next = permit(1, 2);
    let sig = s.sign_digest(&dir.permit_digest(&next));
    dir.permit_set(relayer(), &next, &sig).unwrap();
    assert_eq!(dir.nonce_of(&s.identity()), 2);
    assert_eq!(
        dir.get(&fixed_key("INTEREST_RATE_MODEL").unwrap()),
        Some(Identifier::from_low_u64(2))
    );
}

/// Test: A permit from the future (nonce ahead of the counter) is refused.
#[test]
fn test_future_nonce_rejected() {
    let (mut dir, _, _) = directory();
    let s = signer();
    let p = permit(1, 1);
    let sig = s.sign_digest(&dir.permit_digest(&p));
    assert!(matches!(
        dir.permit_set(relayer(), &p, &sig),
        Err(DirectoryError::InvalidNonce { expected: 0, got: 1, .. })
    ));
    assert_eq!(dir.nonce_of(&s.identity()), 0);
}

/// Test: An idempotent permit still consumes its nonce.
#[test]
fn test_unchanged_write_still_consumes_nonce() {
    let (mut dir, _, _) = directory();
    let s = signer();
    let first = permit(0, 9);
    let sig = s.sign_digest(&dir.permit_digest(&first));
    dir.permit_set(relayer(), &first, &sig).unwrap();

    let same = permit(1, 9);
    let sig = s.sign_digest(&dir.permit_digest(&same));
    let result = dir.permit_set(relayer(), &same, &sig).unwrap();
    assert!(!result.outcome.changed);
    assert_eq!(dir.nonce_of(&s.identity()), 2);
}

/// Test: Nonce counters are per signer.
#[test]
fn test_nonces_are_per_signer() {
    let (mut dir, _, _) = directory();
    let s = signer();
    let p = permit(0, 1);
    let sig = s.sign_digest(&dir.permit_digest(&p));
    dir.permit_set(relayer(), &p, &sig).unwrap();

    let other = PermitSigner::from_secret_bytes(&[0x43; 32]).unwrap();
    assert_eq!(dir.nonce_of(&other.identity()), 0);
}

// =============================================================================
// SIGNATURE COMPONENTS
// =============================================================================

/// Test: A tampered payload recovers a different signer and is refused.
#[test]
fn test_tampered_payload() {
    let (mut dir, _, _) = directory();
    let s = signer();
    let p = permit(0, 1);
    let sig = s.sign_digest(&dir.permit_digest(&p));

    let mut forged = p.clone();
    forged.new_identifier = Identifier::from_low_u64(666);
    assert!(dir.permit_set(relayer(), &forged, &sig).is_err());
    assert_eq!(dir.get(&p.key), None);
}

/// Test: Malformed components are refused before recovery.
#[test]
fn test_malformed_components() {
    let (mut dir, _, _) = directory();
    let s = signer();
    let p = permit(0, 1);
    let good = s.sign_digest(&dir.permit_digest(&p));

    let mut bad_v = good;
    bad_v.v = 29;
    let mut zero_r = good;
    zero_r.r = [0u8; 32];
    let mut high_s = good;
    high_s.s = [0xff; 32];

    for sig in [bad_v, zero_r, high_s] {
        assert!(matches!(
            dir.permit_set(relayer(), &p, &sig),
            Err(DirectoryError::InvalidSignature(_))
        ));
    }
    assert_eq!(dir.nonce_of(&s.identity()), 0);
}

/// Test: Hex round trip of a real signature keeps it redeemable.
#[test]
fn test_signature_hex_transport() {
    let (mut dir, _, _) = directory();
    let s = signer();
    let p = permit(0, 1);
    let sig = s.sign_digest(&dir.permit_digest(&p));
    let transported = PermitSignature::from_hex(&sig.to_hex()).unwrap();
    assert!(dir.permit_set(relayer(), &p, &transported).is_ok());
}

// =============================================================================
// DOMAIN BINDING
// =============================================================================

/// Test: A signature for one directory is not valid on another.
#[test]
fn test_signature_bound_to_directory_identity() {
    let s = signer();
    let (dir_a, _, _) = directory();
    let mut other = DirectoryConfig::default();
    other.name = "OtherDirectory".into();
    other.verifying_identity = moduledir::directory::derive_identity("OtherDirectory");
    let (mut dir_b, _, _) = directory_for(other, s.identity());

    let p = permit(0, 1);
    assert_ne!(dir_a.domain_separator(), dir_b.domain_separator());
    let sig = s.sign_digest(&dir_a.permit_digest(&p));
    assert!(dir_b.permit_set(relayer(), &p, &sig).is_err());
    assert_eq!(dir_b.nonce_of(&s.identity()), 0);
}

/// Test: The separator follows the live network identity.
#[test]
fn test_separator_recomputed_on_network_change() {
    let (dir, env, _) = directory();
    let before = dir.domain_separator();
    env.set_network_id(5);
    assert_ne!(dir.domain_separator(), before);
    env.set_network_id(1);
    assert_eq!(dir.domain_separator(), before);
}

// =============================================================================
// EXPIRY AND ATTRIBUTION
// =============================================================================

/// Test: Expired permits are refused regardless of signature validity.
#[test]
fn test_expired() {
    let (mut dir, env, _) = directory();
    let s = signer();
    let p = permit(0, 1);
    let sig = s.sign_digest(&dir.permit_digest(&p));
    env.set_now(p.deadline + 1);
    assert!(matches!(
        dir.permit_set(relayer(), &p, &sig),
        Err(DirectoryError::Expired { .. })
    ));
}

/// Test: History and events name the signer; the relayer only appears in
/// the consumption event.
#[test]
fn test_history_attributed_to_signer() {
    let (mut dir, _, sink) = directory();
    let s = signer();
    let p = permit(0, 1);
    let sig = s.sign_digest(&dir.permit_digest(&p));
    dir.permit_set(relayer(), &p, &sig).unwrap();

    let entry = HistoryLedger::at(dir.layout(), &p.key, 0).unwrap();
    assert_eq!(entry.executor, s.identity());

    match &sink.events()[0] {
        DirectoryEvent::PermitConsumed {
            signer, relayer: r, nonce, ..
        } => {
            assert_eq!(*signer, s.identity());
            assert_eq!(*r, relayer());
            assert_eq!(*nonce, 0);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

/// Test: Batch permits share the nonce sequence with single permits.
#[test]
fn test_batch_and_single_share_nonces() {
    let (mut dir, _, _) = directory();
    let s = signer();
    let single = permit(0, 1);
    let sig = s.sign_digest(&dir.permit_digest(&single));
    dir.permit_set(relayer(), &single, &sig).unwrap();

    let batch = SetModuleBatchPermit {
        keys: vec![fixed_key("TREASURY").unwrap()],
        identifiers: vec![Identifier::from_low_u64(2)],
        allow_replace: false,
        nonce: 1,
        deadline: NOW + 10,
    };
    let sig = s.sign_digest(&dir.permit_digest(&batch));
    let result = dir.permit_set_batch(relayer(), &batch, &sig).unwrap();
    assert_eq!(result.outcome.changed_count(), 1);
    assert_eq!(dir.nonce_of(&s.identity()), 2);
}

/// Test: A signer without admin authority cannot redeem, and keeps its nonce.
#[test]
fn test_unauthorized_signer() {
    let (mut dir, _, _) = directory_for(DirectoryConfig::default(), Identity::from_low_u64(77));
    let s = signer();
    let p = permit(0, 1);
    let sig = s.sign_digest(&dir.permit_digest(&p));
    assert!(matches!(
        dir.permit_set(relayer(), &p, &sig),
        Err(DirectoryError::MissingRole { .. })
    ));
    assert_eq!(dir.nonce_of(&s.identity()), 0);
}
