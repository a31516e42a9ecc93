//! Ledger snapshot persistence.
//!
//! The whole ledger is small (hundreds of recipients per wave), so it is
//! persisted as a single JSON snapshot, written atomically:
//!
//! 1. Write to `<path>.tmp`
//! 2. fsync the file
//! 3. Rename to `<path>`
//! 4. fsync the directory
//!
//! Readers always see either the old or the new snapshot, never a partial
//! write.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Store;
use super::fsync::{fsync_dir, fsync_file};
use crate::types::{Contact, Intervention};

/// Current schema version. Increment when making breaking changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Errors that can occur during snapshot operations.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Schema version mismatch.
    #[error("schema version mismatch: expected {expected}, got {got}")]
    SchemaMismatch { expected: u32, got: u32 },
}

/// Result type for snapshot operations.
pub type Result<T> = std::result::Result<T, SnapshotError>;

/// The persisted ledger state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignSnapshot {
    /// Schema version for forward-compatible migrations.
    pub schema_version: u32,

    /// When this snapshot was written (ISO 8601).
    pub saved_at: DateTime<Utc>,

    /// Next intervention id to assign.
    pub next_id: u64,

    pub contacts: Vec<Contact>,
    pub interventions: Vec<Intervention>,
}

impl CampaignSnapshot {
    pub fn from_store(store: &Store) -> Self {
        let (contacts, interventions, next_id) = store.to_parts();
        CampaignSnapshot {
            schema_version: SCHEMA_VERSION,
            saved_at: Utc::now(),
            next_id,
            contacts,
            interventions,
        }
    }

    pub fn into_store(self) -> Store {
        Store::from_parts(self.contacts, self.interventions, self.next_id)
    }
}

/// Writes the store to `path` using the write-temp-then-rename pattern.
pub fn save_snapshot_atomic(path: &Path, store: &Store) -> Result<()> {
    let snapshot = CampaignSnapshot::from_store(store);
    let bytes = serde_json::to_vec_pretty(&snapshot)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("json.tmp");
    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;
        file.write_all(&bytes)?;
        fsync_file(&file)?;
    }

    std::fs::rename(&temp_path, path)?;
    if let Some(parent) = path.parent() {
        fsync_dir(parent)?;
    }

    Ok(())
}

/// Loads a store from a snapshot file. `Ok(None)` if none exists yet.
pub fn load_snapshot(path: &Path) -> Result<Option<Store>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let snapshot: CampaignSnapshot = serde_json::from_slice(&bytes)?;
    if snapshot.schema_version != SCHEMA_VERSION {
        return Err(SnapshotError::SchemaMismatch {
            expected: SCHEMA_VERSION,
            got: snapshot.schema_version,
        });
    }

    Ok(Some(snapshot.into_store()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NewIntervention;
    use crate::types::{Arm, Channel, InterventionKey, MeasureId, PracticeId, Wave};
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn populated_store() -> Store {
        let mut store = Store::new();
        store.replace_contacts(vec![
            Contact::new(PracticeId::new("A83050"), "THE SURGERY")
                .with_email("a@example.com")
                .with_fax("01642 260897"),
        ]);
        store
            .insert_interventions(vec![NewIntervention {
                key: InterventionKey::new(Channel::Email, Wave::ONE, PracticeId::new("A83050")),
                arm: Arm::ContentRich,
                created_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                measure_id: MeasureId::new("nimodipine"),
            }])
            .unwrap();
        store
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let store = populated_store();

        save_snapshot_atomic(&path, &store).unwrap();
        let loaded = load_snapshot(&path).unwrap().unwrap();

        assert_eq!(loaded, store);
    }

    #[test]
    fn load_missing_snapshot_is_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        assert!(load_snapshot(&path).unwrap().is_none());
    }

    #[test]
    fn temp_file_is_cleaned_up_on_success() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");

        save_snapshot_atomic(&path, &populated_store()).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state").join("ledger.json");

        save_snapshot_atomic(&path, &populated_store()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn schema_mismatch_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");

        let mut snapshot = CampaignSnapshot::from_store(&populated_store());
        snapshot.schema_version = 999;
        std::fs::write(&path, serde_json::to_vec(&snapshot).unwrap()).unwrap();

        let result = load_snapshot(&path);
        assert!(matches!(
            result,
            Err(SnapshotError::SchemaMismatch { got: 999, .. })
        ));
    }

    #[test]
    fn next_id_survives_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let mut store = populated_store();

        save_snapshot_atomic(&path, &store).unwrap();
        let mut loaded = load_snapshot(&path).unwrap().unwrap();

        // Ids assigned after reload continue from where the original left off
        let next_in_original = store
            .insert_interventions(vec![NewIntervention {
                key: InterventionKey::new(Channel::Fax, Wave::ONE, PracticeId::new("A83050")),
                arm: Arm::ContentRich,
                created_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                measure_id: MeasureId::new("nimodipine"),
            }])
            .unwrap();
        let next_in_loaded = loaded
            .insert_interventions(vec![NewIntervention {
                key: InterventionKey::new(Channel::Fax, Wave::ONE, PracticeId::new("A83050")),
                arm: Arm::ContentRich,
                created_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                measure_id: MeasureId::new("nimodipine"),
            }])
            .unwrap();
        assert_eq!(next_in_original, next_in_loaded);
    }
}
