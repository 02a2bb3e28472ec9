//! Device tier
//!
//! A single JSON array of snapshots under one key. An older code path kept
//! a plain array under a second key; both are read and merged (primary
//! wins on id collision). The first write migrates everything to the
//! primary key and drops the legacy one.

use std::collections::HashSet;

use super::{PersistenceAdapter, PersistenceError, Snapshot, parse_snapshot_list};
use crate::platform::KeyValueStore;

pub struct LocalTier {
    storage: Box<dyn KeyValueStore>,
}

impl LocalTier {
    /// Primary LocalStorage key
    pub const STORAGE_KEY: &'static str = "shm_lab_snapshots";
    /// Key used by the older save path
    pub const LEGACY_KEY: &'static str = "savedSimulations";

    pub fn new(storage: Box<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    fn read_key(&self, key: &str) -> Result<Vec<Snapshot>, PersistenceError> {
        Ok(self
            .storage
            .get_item(key)?
            .map(|json| parse_snapshot_list(&json))
            .unwrap_or_default())
    }
}

impl PersistenceAdapter for LocalTier {
    fn load_all(&self) -> Result<Vec<Snapshot>, PersistenceError> {
        let mut snapshots = self.read_key(Self::STORAGE_KEY)?;
        let legacy = self.read_key(Self::LEGACY_KEY)?;

        let mut seen: HashSet<String> = HashSet::new();
        snapshots.retain(|s| seen.insert(s.id.clone()));
        for snapshot in legacy {
            if seen.insert(snapshot.id.clone()) {
                snapshots.push(snapshot);
            }
        }
        Ok(snapshots)
    }

    fn save_all(&mut self, snapshots: &[Snapshot]) -> Result<(), PersistenceError> {
        let json = serde_json::to_string(snapshots)?;
        self.storage.set_item(Self::STORAGE_KEY, &json)?;

        if matches!(self.storage.get_item(Self::LEGACY_KEY), Ok(Some(_))) {
            match self.storage.remove_item(Self::LEGACY_KEY) {
                Ok(()) => log::info!("Migrated legacy snapshots to {}", Self::STORAGE_KEY),
                Err(e) => log::warn!("Legacy snapshot key not removed: {}", e),
            }
        }
        log::debug!("Device tier holds {} snapshots", snapshots.len());
        Ok(())
    }

    fn create(&mut self, snapshot: Snapshot) -> Result<String, PersistenceError> {
        let mut all = self.load_all()?;
        let id = snapshot.id.clone();
        all.retain(|s| s.id != id);
        all.push(snapshot);
        self.save_all(&all)?;
        Ok(id)
    }
}
