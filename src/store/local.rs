use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::RecordStore;
use crate::error::PersistError;
use crate::models::{Record, RecordKey, RecordKind, RecordSet};

/// Single JSON document holding all four collections. Every write rewrites
/// the whole file through a temp file and a rename.
#[derive(Debug, Clone)]
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the document; a missing file is an empty record set.
    pub fn load(&self) -> Result<RecordSet, PersistError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(RecordSet::default())
            }
            Err(err) => {
                return Err(PersistError::LocalIo(format!(
                    "failed to read {}: {err}",
                    self.path.display()
                )))
            }
        };
        if content.trim().is_empty() {
            return Ok(RecordSet::default());
        }
        serde_json::from_str(&content).map_err(|err| {
            PersistError::LocalIo(format!("failed to parse {}: {err}", self.path.display()))
        })
    }

    pub fn save(&self, set: &RecordSet) -> Result<(), PersistError> {
        let payload = serde_json::to_string_pretty(set)
            .map_err(|err| PersistError::LocalIo(format!("failed to serialize records: {err}")))?;
        write_atomic(&self.path, &payload)
    }

    fn modify<T>(&self, apply: impl FnOnce(&mut RecordSet) -> T) -> Result<T, PersistError> {
        let mut set = self.load()?;
        let outcome = apply(&mut set);
        self.save(&set)?;
        Ok(outcome)
    }
}

fn write_atomic(path: &Path, payload: &str) -> Result<(), PersistError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|err| {
            PersistError::LocalIo(format!("failed to create {}: {err}", parent.display()))
        })?;
    }

    let temp_path = match path.file_name() {
        Some(name) => path.with_file_name(format!("{}.tmp", name.to_string_lossy())),
        None => path.with_extension("tmp"),
    };

    std::fs::write(&temp_path, payload).map_err(|err| {
        PersistError::LocalIo(format!("failed to write {}: {err}", temp_path.display()))
    })?;
    std::fs::rename(&temp_path, path).map_err(|err| {
        PersistError::LocalIo(format!("failed to replace {}: {err}", path.display()))
    })
}

#[async_trait]
impl RecordStore for LocalStore {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn probe(&self) -> Result<(), PersistError> {
        self.load().map(|_| ())
    }

    async fn upsert(&self, record: &Record) -> Result<(), PersistError> {
        self.modify(|set| set.upsert(record.clone()))
    }

    async fn delete(&self, key: &RecordKey) -> Result<bool, PersistError> {
        self.modify(|set| set.remove(key))
    }

    async fn list(&self, kind: RecordKind) -> Result<Vec<Record>, PersistError> {
        Ok(self.load()?.records(kind))
    }

    async fn replace_all(&self, kind: RecordKind, records: &[Record]) -> Result<(), PersistError> {
        self.modify(|set| set.replace(kind, records.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Milestone, Rating};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, d).unwrap()
    }

    fn store() -> (TempDir, LocalStore) {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path().join("records.json"));
        (dir, store)
    }

    #[tokio::test]
    async fn missing_file_lists_nothing() {
        let (_dir, store) = store();
        assert!(store.list(RecordKind::Attendance).await.unwrap().is_empty());
        assert!(store.probe().await.is_ok());
    }

    #[tokio::test]
    async fn upsert_overwrites_and_persists() {
        let (_dir, store) = store();
        store.upsert(&Record::attendance(day(1), "Lucy", false)).await.unwrap();
        store.upsert(&Record::attendance(day(1), "Lucy", true)).await.unwrap();

        let reopened = LocalStore::new(store.path());
        let records = reopened.list(RecordKind::Attendance).await.unwrap();
        assert_eq!(records.len(), 1);
        match &records[0] {
            Record::Attendance(r) => assert!(r.present),
            other => panic!("unexpected record {other:?}"),
        }
    }

    #[tokio::test]
    async fn write_leaves_no_temp_file() {
        let (dir, store) = store();
        store.upsert(&Record::attendance(day(2), "Vann", true)).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["records.json".to_string()]);
    }

    #[tokio::test]
    async fn document_has_four_named_collections() {
        let (_dir, store) = store();
        store
            .upsert(&Record::progress(Milestone::Day90, "Lucy", "Math", Rating::NeedsImprovement))
            .await
            .unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        for key in ["attendance", "assignments", "progress_90", "progress_180"] {
            assert!(raw.get(key).is_some_and(|v| v.is_array()), "missing {key}");
        }
        assert_eq!(raw["progress_90"][0]["rating"], "Needs Improvement");
    }

    #[tokio::test]
    async fn delete_and_replace_all() {
        let (_dir, store) = store();
        let record = Record::assignment(day(3), "Killian", "Other", "Chess", true);
        store.upsert(&record).await.unwrap();
        assert!(store.delete(&record.key()).await.unwrap());
        assert!(!store.delete(&record.key()).await.unwrap());

        store.upsert(&Record::attendance(day(1), "Lucy", true)).await.unwrap();
        store
            .replace_all(
                RecordKind::Attendance,
                &[Record::attendance(day(4), "Vann", false)],
            )
            .await
            .unwrap();
        let records = store.list(RecordKind::Attendance).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].student(), "Vann");
    }

    #[tokio::test]
    async fn corrupt_document_is_a_local_error() {
        let (_dir, store) = store();
        std::fs::write(store.path(), "{ not json").unwrap();
        let err = store.list(RecordKind::Attendance).await.unwrap_err();
        assert!(matches!(err, PersistError::LocalIo(_)));

        // the corrupt file is left in place rather than overwritten
        assert!(store.upsert(&Record::attendance(day(1), "Lucy", true)).await.is_err());
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "{ not json");
    }
}
