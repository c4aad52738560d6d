//! Layout Persistence Tests
//!
//! Test Categories:
//! 1. Full state survives save and reopen
//! 2. Corruption detection
//! 3. Event log file output

use std::fs;
use std::sync::Arc;

use moduledir::env::ManualEnvironment;
use moduledir::governance::{Role, StaticAccessControl};
use moduledir::history::HistoryLedger;
use moduledir::keys::fixed_key;
use moduledir::observability::FileEventSink;
use moduledir::store::{LayoutStore, LAYOUT_FILE_NAME};
use moduledir::{
    Collaborators, Directory, DirectoryConfig, DirectoryError, Identifier, Identity, InitParams,
};
use tempfile::tempdir;

fn owner() -> Identity {
    Identity::from_low_u64(1)
}

fn registrar() -> Identity {
    Identity::from_low_u64(4)
}

fn collaborators(env: &ManualEnvironment) -> Collaborators {
    let access = StaticAccessControl::new().grant(Role::KeyRegistrar, registrar());
    Collaborators::new(Arc::new(env.clone()), Arc::new(access))
}

fn params() -> InitParams {
    InitParams {
        owner: owner(),
        emergency: Identity::from_low_u64(2),
        upgrader: Identity::from_low_u64(3),
        min_delay: 60,
    }
}

// =============================================================================
// ROUND TRIP OF A LIVE DIRECTORY
// =============================================================================

/// Test: Modules, pending upgrades, history, nonces, governance and dynamic
/// keys all survive a save and reopen, and the reopened directory keeps
/// operating.
#[test]
fn test_reopen_preserves_state() {
    let dir = tempdir().unwrap();
    let store = LayoutStore::new(dir.path());
    let env = ManualEnvironment::new(1_000, 1);

    let mut directory =
        Directory::initialize(DirectoryConfig::default(), params(), collaborators(&env)).unwrap();
    let lending = fixed_key("LENDING_ENGINE").unwrap();
    let oracle = fixed_key("PRICE_ORACLE").unwrap();
    directory
        .set(owner(), lending, Identifier::from_low_u64(1), false)
        .unwrap();
    directory
        .schedule(owner(), oracle, Identifier::from_low_u64(2))
        .unwrap();
    let bridge = directory.register_key(registrar(), "bridge").unwrap();
    directory
        .set_pending_owner(owner(), Identity::from_low_u64(9))
        .unwrap();
    store.save(directory.layout()).unwrap();
    let saved = directory.into_layout();

    let loaded = store.load().unwrap().unwrap();
    assert_eq!(loaded, saved);

    let mut reopened =
        Directory::open(loaded, DirectoryConfig::default(), collaborators(&env)).unwrap();
    assert_eq!(reopened.get(&lending), Some(Identifier::from_low_u64(1)));
    assert_eq!(HistoryLedger::count(reopened.layout(), &lending), 1);
    assert_eq!(reopened.pending_owner(), Some(Identity::from_low_u64(9)));
    assert_eq!(reopened.resolve_name("bridge"), Some(bridge.key));

    env.advance(60);
    assert!(reopened.execute(owner(), oracle).unwrap().changed);
}

/// Test: Saving over an existing layout replaces it and leaves no temp file.
#[test]
fn test_overwrite_is_clean() {
    let dir = tempdir().unwrap();
    let store = LayoutStore::new(dir.path());
    let env = ManualEnvironment::new(1_000, 1);
    let mut directory =
        Directory::initialize(DirectoryConfig::default(), params(), collaborators(&env)).unwrap();

    store.save(directory.layout()).unwrap();
    directory.set_min_delay(owner(), 5).unwrap();
    store.save(directory.layout()).unwrap();

    assert_eq!(store.load().unwrap().unwrap().min_delay, 5);
    let names: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec![LAYOUT_FILE_NAME.to_string()]);
}

// =============================================================================
// CORRUPTION
// =============================================================================

/// Test: A flipped byte in the file is detected on load.
#[test]
fn test_corruption_detected() {
    let dir = tempdir().unwrap();
    let store = LayoutStore::new(dir.path());
    let env = ManualEnvironment::new(1_000, 1);
    let directory =
        Directory::initialize(DirectoryConfig::default(), params(), collaborators(&env)).unwrap();
    store.save(directory.layout()).unwrap();

    let content = fs::read_to_string(store.path()).unwrap();
    let tampered = content.replacen("\\\"min_delay\\\":60", "\\\"min_delay\\\":0", 1);
    assert_ne!(content, tampered);
    fs::write(store.path(), tampered).unwrap();

    assert!(matches!(store.load(), Err(DirectoryError::Storage(_))));
}

/// Test: Garbage in the file is a storage error, not a panic.
#[test]
fn test_garbage_file() {
    let dir = tempdir().unwrap();
    let store = LayoutStore::new(dir.path());
    fs::write(store.path(), b"not json at all").unwrap();
    assert!(matches!(store.load(), Err(DirectoryError::Storage(_))));
}

/// Test: No file means not initialized.
#[test]
fn test_missing_file() {
    let dir = tempdir().unwrap();
    assert!(LayoutStore::new(dir.path()).load().unwrap().is_none());
}

// =============================================================================
// EVENT LOG
// =============================================================================

/// Test: Committed events land in the event log as JSON lines; rejected
/// calls add nothing.
#[test]
fn test_event_log_file() {
    let dir = tempdir().unwrap();
    let log_path = dir.path().join("events.jsonl");
    let env = ManualEnvironment::new(1_000, 1);
    let sink = FileEventSink::open(&log_path).unwrap();
    let mut directory = Directory::initialize(
        DirectoryConfig::default(),
        params(),
        collaborators(&env).with_events(Arc::new(sink)),
    )
    .unwrap();

    let key = fixed_key("TREASURY").unwrap();
    directory
        .set(owner(), key, Identifier::from_low_u64(1), false)
        .unwrap();
    assert!(directory
        .set(Identity::from_low_u64(50), key, Identifier::from_low_u64(2), true)
        .is_err());

    let content = fs::read_to_string(&log_path).unwrap();
    let lines: Vec<serde_json::Value> = content
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["event"], "MODULE_CHANGED");
    assert_eq!(lines[0]["key"], key.to_hex());
    assert_eq!(lines[1]["event"], "HISTORY_RECORDED");
    assert!(lines[0]["id"].is_string());
}
