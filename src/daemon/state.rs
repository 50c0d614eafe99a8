//! Daemon state: the pending-update set and its state file.

use crate::common::error::Result;
use crate::common::persistence::{load_updates, save_updates};
use crate::common::settings::DEFAULT_FILE_PERMS;
use crate::common::updates::{UpdateRecord, UpdateSet};
use std::path::{Path, PathBuf};

/// Pending updates owned by the daemon. Only the daemon writes the state
/// file; clients see snapshots sent over the wire.
#[derive(Debug)]
pub struct UpdateStore {
    path: PathBuf,
    file_perms: u32,
    updates: UpdateSet,
}

impl UpdateStore {
    /// Empty store that will save to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file_perms: DEFAULT_FILE_PERMS,
            updates: UpdateSet::new(),
        }
    }

    /// Load the store saved by a previous run. Called once at startup.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let updates = load_updates(&path)?;
        Ok(Self {
            path,
            file_perms: DEFAULT_FILE_PERMS,
            updates,
        })
    }

    pub fn with_file_perms(mut self, file_perms: u32) -> Self {
        self.file_perms = file_perms;
        self
    }

    /// Write the full set. On error the state is not durably recorded and
    /// the caller may retry.
    pub fn save(&self) -> Result<()> {
        save_updates(&self.path, &self.updates, self.file_perms)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn updates(&self) -> &UpdateSet {
        &self.updates
    }

    pub fn snapshot(&self) -> UpdateSet {
        self.updates.clone()
    }

    /// Mark records pending; returns how many were new.
    pub fn merge(&mut self, records: impl IntoIterator<Item = UpdateRecord>) -> usize {
        records
            .into_iter()
            .map(|record| self.updates.insert(record))
            .filter(|added| *added)
            .count()
    }

    /// Drop every pending update; returns how many there were.
    pub fn clear(&mut self) -> usize {
        let cleared = self.updates.len();
        self.updates.clear();
        cleared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::Error;
    use std::fs;

    #[test]
    fn test_load_missing_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = UpdateStore::load(tmp.path().join("updates.json")).unwrap();
        assert!(store.updates().is_empty());
    }

    #[test]
    fn test_load_corrupt_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("updates.json");
        fs::write(&path, "{{{").unwrap();
        assert!(matches!(
            UpdateStore::load(&path),
            Err(Error::Persistence { .. })
        ));
    }

    #[test]
    fn test_merge_counts_new_records() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = UpdateStore::new(tmp.path().join("updates.json"));
        assert_eq!(
            store.merge(vec![UpdateRecord::new("http://a/"), UpdateRecord::new("http://b/")]),
            2
        );
        assert_eq!(
            store.merge(vec![UpdateRecord::new("http://b/"), UpdateRecord::new("http://c/")]),
            1
        );
        assert_eq!(store.updates().len(), 3);
    }

    #[test]
    fn test_state_survives_restart() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("updates.json");
        let mut store = UpdateStore::new(&path);
        store.merge(vec![UpdateRecord::detected_now("http://a/")]);
        store.save().unwrap();

        let reloaded = UpdateStore::load(&path).unwrap();
        assert_eq!(reloaded.snapshot(), store.snapshot());
    }

    #[test]
    fn test_clear_then_save() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("updates.json");
        let mut store = UpdateStore::new(&path);
        store.merge(vec![UpdateRecord::new("http://a/")]);
        store.save().unwrap();

        assert_eq!(store.clear(), 1);
        store.save().unwrap();
        assert!(UpdateStore::load(&path).unwrap().updates().is_empty());
    }
}
