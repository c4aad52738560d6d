//! Durable layout file
//!
//! The layout lives at one fixed path per data directory so that replacing
//! the logic operating on it never relocates the data.
//!
//! Atomicity is achieved via:
//! 1. Write envelope to temp file
//! 2. fsync temp file
//! 3. Rename temp to final (atomic on POSIX)
//! 4. fsync the directory

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::checksum::{compute_checksum, verify_checksum};
use super::layout::Layout;
use crate::errors::{DirectoryError, DirectoryResult};

/// File name of the persisted layout
pub const LAYOUT_FILE_NAME: &str = "directory.layout";

const ENVELOPE_FORMAT: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    format: u32,
    checksum: u32,
    payload: String,
}

/// Reads and writes the layout file.
#[derive(Debug, Clone)]
pub struct LayoutStore {
    path: PathBuf,
    temp_path: PathBuf,
}

impl LayoutStore {
    /// Store rooted at `data_dir`.
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(LAYOUT_FILE_NAME),
            temp_path: data_dir.join(format!("{}.tmp", LAYOUT_FILE_NAME)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Persist `layout` atomically.
    pub fn save(&self, layout: &Layout) -> DirectoryResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| storage("create data directory", e))?;
        }

        let payload =
            serde_json::to_string(layout).map_err(|e| storage("serialize layout", e))?;
        let envelope = Envelope {
            format: ENVELOPE_FORMAT,
            checksum: compute_checksum(payload.as_bytes()),
            payload,
        };
        let content =
            serde_json::to_vec_pretty(&envelope).map_err(|e| storage("serialize envelope", e))?;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.temp_path)
            .map_err(|e| storage("create temp layout file", e))?;
        file.write_all(&content)
            .map_err(|e| storage("write layout", e))?;
        file.sync_all().map_err(|e| storage("fsync layout", e))?;

        fs::rename(&self.temp_path, &self.path).map_err(|e| storage("commit layout", e))?;

        if let Some(parent) = self.path.parent() {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        Ok(())
    }

    /// Load the layout. `Ok(None)` if nothing has been persisted yet.
    pub fn load(&self) -> DirectoryResult<Option<Layout>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read(&self.path).map_err(|e| storage("read layout", e))?;
        let envelope: Envelope =
            serde_json::from_slice(&content).map_err(|e| storage("parse envelope", e))?;

        if envelope.format != ENVELOPE_FORMAT {
            return Err(DirectoryError::Storage(format!(
                "unsupported layout envelope format {}",
                envelope.format
            )));
        }
        if !verify_checksum(envelope.payload.as_bytes(), envelope.checksum) {
            return Err(DirectoryError::Storage(format!(
                "checksum mismatch in {}",
                self.path.display()
            )));
        }

        let layout: Layout =
            serde_json::from_str(&envelope.payload).map_err(|e| storage("parse layout", e))?;
        Ok(Some(layout))
    }
}

fn storage(action: &str, err: impl std::fmt::Display) -> DirectoryError {
    DirectoryError::Storage(format!("failed to {}: {}", action, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DEFAULT_HISTORY_CAPACITY;
    use crate::types::{Identifier, Identity, Key};
    use tempfile::tempdir;

    fn layout() -> Layout {
        let mut l = Layout::new(
            1,
            Identity::from_low_u64(1),
            Identity::from_low_u64(2),
            Identity::from_low_u64(1),
            60,
            DEFAULT_HISTORY_CAPACITY,
        );
        l.modules
            .insert(Key::from_name("PRICE_ORACLE"), Identifier::from_low_u64(77));
        l.nonces.insert(Identity::from_low_u64(5), 3);
        l
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = tempdir().unwrap();
        let store = LayoutStore::new(dir.path());
        assert!(!store.exists());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let store = LayoutStore::new(dir.path());
        let original = layout();
        store.save(&original).unwrap();
        assert!(store.exists());
        assert_eq!(store.load().unwrap(), Some(original));
        // temp file does not linger
        assert!(!dir.path().join("directory.layout.tmp").exists());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let dir = tempdir().unwrap();
        let store = LayoutStore::new(dir.path());
        store.save(&layout()).unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        let mut envelope: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let payload = envelope["payload"].as_str().unwrap().replace("\"min_delay\":60", "\"min_delay\":0");
        envelope["payload"] = serde_json::Value::String(payload);
        fs::write(store.path(), serde_json::to_vec(&envelope).unwrap()).unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, DirectoryError::Storage(ref m) if m.contains("checksum")));
    }
}
