//! Persistence of location records.
//!
//! The pipeline only talks to [`LocationStore`]; the two implementations here
//! keep records in memory or in a single JSON file.

use std::{
    collections::BTreeMap,
    fmt::Debug,
    fs, io,
    path::{Path, PathBuf},
};

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{
    error::{StoreError, ValidationError},
    model::{LocationInput, LocationRecord, RecordId},
};

pub trait LocationStore: Send + Sync + Debug {
    /// Persist a new record for `input` and return it with its id assigned.
    fn create(&self, input: LocationInput) -> Result<LocationRecord, StoreError>;

    fn load(&self, id: RecordId) -> Result<LocationRecord, StoreError>;

    /// Full save of every field. The record is written even when its body
    /// fails validation; the problems are returned for display.
    fn save(&self, record: &LocationRecord) -> Result<Vec<ValidationError>, StoreError>;

    fn list(&self) -> Result<Vec<LocationRecord>, StoreError>;

    fn delete(&self, id: RecordId) -> Result<(), StoreError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Records {
    next_id: u64,
    records: BTreeMap<RecordId, LocationRecord>,
}

impl Records {
    fn create(&mut self, input: LocationInput) -> LocationRecord {
        self.next_id += 1;
        let record = LocationRecord::new(RecordId(self.next_id), input);
        self.records.insert(record.id, record.clone());
        record
    }

    fn load(&self, id: RecordId) -> Result<LocationRecord, StoreError> {
        self.records.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    fn save(&mut self, record: &LocationRecord) -> Result<Vec<ValidationError>, StoreError> {
        let slot = self
            .records
            .get_mut(&record.id)
            .ok_or(StoreError::NotFound(record.id))?;

        *slot = record.clone();
        slot.updated_at = Utc::now();
        Ok(record.body_errors())
    }

    fn list(&self) -> Vec<LocationRecord> {
        self.records.values().cloned().collect()
    }

    fn delete(&mut self, id: RecordId) -> Result<(), StoreError> {
        self.records
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Records>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocationStore for MemoryStore {
    fn create(&self, input: LocationInput) -> Result<LocationRecord, StoreError> {
        Ok(self.inner.lock().create(input))
    }

    fn load(&self, id: RecordId) -> Result<LocationRecord, StoreError> {
        self.inner.lock().load(id)
    }

    fn save(&self, record: &LocationRecord) -> Result<Vec<ValidationError>, StoreError> {
        self.inner.lock().save(record)
    }

    fn list(&self) -> Result<Vec<LocationRecord>, StoreError> {
        Ok(self.inner.lock().list())
    }

    fn delete(&self, id: RecordId) -> Result<(), StoreError> {
        self.inner.lock().delete(id)
    }
}

/// All records in one JSON document, rewritten on every change.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: Mutex<Records>,
}

impl JsonFileStore {
    /// Open `path`, starting empty if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let records = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => Records::default(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        Ok(Self {
            path,
            inner: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, records: &Records) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(records)
            .map_err(|e| io_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

impl LocationStore for JsonFileStore {
    fn create(&self, input: LocationInput) -> Result<LocationRecord, StoreError> {
        let mut records = self.inner.lock();
        let record = records.create(input);
        self.persist(&records)?;
        Ok(record)
    }

    fn load(&self, id: RecordId) -> Result<LocationRecord, StoreError> {
        self.inner.lock().load(id)
    }

    fn save(&self, record: &LocationRecord) -> Result<Vec<ValidationError>, StoreError> {
        let mut records = self.inner.lock();
        let errors = records.save(record)?;
        self.persist(&records)?;
        Ok(errors)
    }

    fn list(&self) -> Result<Vec<LocationRecord>, StoreError> {
        Ok(self.inner.lock().list())
    }

    fn delete(&self, id: RecordId) -> Result<(), StoreError> {
        let mut records = self.inner.lock();
        records.delete(id)?;
        self.persist(&records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn input(s: &str) -> LocationInput {
        LocationInput::parse(s).unwrap()
    }

    #[test]
    fn create_assigns_increasing_ids() {
        let store = MemoryStore::new();
        let a = store.create(input("Tampa, FL")).unwrap();
        let b = store.create(input("Plentywood, MT")).unwrap();

        assert_eq!(a.id, RecordId(1));
        assert_eq!(b.id, RecordId(2));
        assert_eq!(store.load(b.id).unwrap().input.as_str(), "Plentywood, MT");
    }

    #[test]
    fn save_keeps_version_and_reports_body_errors() {
        let store = MemoryStore::new();
        let mut record = store.create(input("Nowhere, ZZ")).unwrap();
        record.raw_body = Some(r#"{"bad_request":"Bad API Request"}"#.into());

        let errors = store.save(&record).unwrap();

        assert_eq!(errors, vec![ValidationError::InvalidAddress]);
        let loaded = store.load(record.id).unwrap();
        assert_eq!(loaded.raw_body, record.raw_body);
        assert_eq!(loaded.version, record.version);
    }

    #[test]
    fn save_unknown_record_is_not_found() {
        let store = MemoryStore::new();
        let record = LocationRecord::new(RecordId(42), input("Tampa, FL"));
        assert!(matches!(store.save(&record), Err(StoreError::NotFound(RecordId(42)))));
    }

    #[test]
    fn delete_removes_record() {
        let store = MemoryStore::new();
        let record = store.create(input("Tampa, FL")).unwrap();

        store.delete(record.id).unwrap();

        assert!(matches!(store.load(record.id), Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete(record.id), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("locations.json");

        let id = {
            let store = JsonFileStore::open(&path).unwrap();
            let mut record = store.create(input("Tampa, FL")).unwrap();
            record.resolved_as = "Tampa, FL, United States".into();
            store.save(&record).unwrap();
            record.id
        };

        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.load(id).unwrap().resolved_as, "Tampa, FL, United States");
        let next = store.create(input("Plentywood, MT")).unwrap();
        assert_eq!(next.id, RecordId(2));
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("locations.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(JsonFileStore::open(&path), Err(StoreError::Corrupt { .. })));
    }
}
