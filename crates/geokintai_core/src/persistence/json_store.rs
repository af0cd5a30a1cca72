//! JSON file snapshot store.
//!
//! # Invariants
//! - Writes go to a sibling temp file and are renamed into place, so a
//!   crash never leaves a truncated snapshot behind.
//! - A missing file loads as an empty snapshot.

use super::{LedgerSnapshot, PersistResult, SnapshotStore};
use log::{error, info};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct JsonFileSnapshotStore {
    path: PathBuf,
}

impl JsonFileSnapshotStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_atomically(&self, snapshot: &LedgerSnapshot) -> PersistResult<usize> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let temp_path = self.temp_path();
        std::fs::write(&temp_path, &bytes)?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(bytes.len())
    }
}

impl SnapshotStore for JsonFileSnapshotStore {
    fn load(&self) -> PersistResult<LedgerSnapshot> {
        let started_at = Instant::now();
        if !self.path.exists() {
            info!("event=snapshot_load module=persistence status=ok mode=empty");
            return Ok(LedgerSnapshot::default());
        }

        let loaded: PersistResult<LedgerSnapshot> = std::fs::read(&self.path)
            .map_err(Into::into)
            .and_then(|bytes| serde_json::from_slice(&bytes).map_err(Into::into));
        match loaded {
            Ok(snapshot) => {
                info!(
                    "event=snapshot_load module=persistence status=ok mode=file duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(snapshot)
            }
            Err(err) => {
                error!(
                    "event=snapshot_load module=persistence status=error mode=file duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn save(&mut self, snapshot: &LedgerSnapshot) -> PersistResult<()> {
        let started_at = Instant::now();
        match self.write_atomically(snapshot) {
            Ok(bytes) => {
                info!(
                    "event=snapshot_save module=persistence status=ok duration_ms={} bytes={}",
                    started_at.elapsed().as_millis(),
                    bytes
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=snapshot_save module=persistence status=error duration_ms={} error_code=snapshot_write_failed error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::JsonFileSnapshotStore;
    use crate::persistence::{LedgerSnapshot, SnapshotStore};

    #[test]
    fn temp_path_is_a_sibling() {
        let store = JsonFileSnapshotStore::new("/var/data/ledger.json");
        assert_eq!(
            store.temp_path().to_str(),
            Some("/var/data/ledger.json.tmp")
        );
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = JsonFileSnapshotStore::new(dir.path().join("absent.json"));
        assert_eq!(store.load().expect("load missing"), LedgerSnapshot::default());
    }
}
