use std::fs;
use std::path::{Path, PathBuf};

use crate::models::ScheduleSnapshot;
use crate::utils::error::Result;

/// JSON-file persistence for the latest schedule snapshot.
///
/// The file is replaced atomically (write-then-rename) so a crash mid-cycle
/// can never leave a half-written state behind.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted snapshot. A missing file means a fresh start; an
    /// unreadable one is logged and treated the same, since monitoring must
    /// come up regardless.
    pub fn load(&self) -> ScheduleSnapshot {
        match fs::read_to_string(&self.path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "state file unreadable; starting with empty snapshot");
                    ScheduleSnapshot::new()
                }
            },
            Err(_) => ScheduleSnapshot::new(),
        }
    }

    pub fn save(&self, snapshot: &ScheduleSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(snapshot)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ScreeningRecord, TicketStatus};

    fn snapshot() -> ScheduleSnapshot {
        vec![ScreeningRecord::new(
            "Mirror",
            "Oct 12 9:30 PM",
            TicketStatus::SoldOut,
            "Sold Out",
            "https://fest.example/s/2",
        )]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));

        store.save(&snapshot()).unwrap();
        let loaded = store.load();

        assert_eq!(loaded.len(), 1);
        assert_eq!(
            loaded.get("mirror_oct 12 9:30 pm").unwrap().status,
            TicketStatus::SoldOut
        );
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("nested/deeper/state.json"));
        store.save(&snapshot()).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();

        let store = StateStore::new(path);
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_save_replaces_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));

        store.save(&snapshot()).unwrap();
        store.save(&ScheduleSnapshot::new()).unwrap();

        assert!(store.load().is_empty());
        // No temp file left behind.
        assert!(!dir.path().join("state.json.tmp").exists());
    }
}
