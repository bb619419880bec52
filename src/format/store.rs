//! Durable storage for sequences, one record per annotation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::record::{AnnotationRecord, SequenceRecord};
use crate::error::PersistError;
use crate::model::AnnotationId;

/// Where the persistence writer puts sequences.
///
/// Called from the writer thread only.
pub trait SequenceStore: Send {
    /// Create or replace the record for `id`.
    fn save(&mut self, id: AnnotationId, record: &SequenceRecord) -> Result<(), PersistError>;

    /// Remove the record for `id`. Removing a missing record succeeds.
    fn delete(&mut self, id: AnnotationId) -> Result<(), PersistError>;

    /// Every stored record, in ID order.
    fn load_all(&self) -> Result<Vec<AnnotationRecord>, PersistError>;
}

/// Stores each annotation as `annotation-<id>.json` inside a directory.
///
/// Writes go to a temporary file that is renamed over the target, so a crash
/// never leaves a half-written record behind.
#[derive(Debug, Clone)]
pub struct FileSequenceStore {
    dir: PathBuf,
}

impl FileSequenceStore {
    const PREFIX: &'static str = "annotation-";
    const EXTENSION: &'static str = "json";

    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        log::debug!("Opened sequence store at {:?}", dir);
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: AnnotationId) -> PathBuf {
        self.dir
            .join(format!("{}{}.{}", Self::PREFIX, id, Self::EXTENSION))
    }

    fn id_from_path(path: &Path) -> Option<AnnotationId> {
        if path.extension()? != Self::EXTENSION {
            return None;
        }
        path.file_stem()?
            .to_str()?
            .strip_prefix(Self::PREFIX)?
            .parse()
            .ok()
    }
}

impl SequenceStore for FileSequenceStore {
    fn save(&mut self, id: AnnotationId, record: &SequenceRecord) -> Result<(), PersistError> {
        let target = self.path_for(id);
        let temp = target.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(&AnnotationRecord {
            id,
            bounding_box_sequence: record.clone(),
        })?;
        std::fs::write(&temp, json)?;
        std::fs::rename(&temp, &target)?;
        log::trace!("Wrote {:?}", target);
        Ok(())
    }

    fn delete(&mut self, id: AnnotationId) -> Result<(), PersistError> {
        match std::fs::remove_file(self.path_for(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn load_all(&self) -> Result<Vec<AnnotationRecord>, PersistError> {
        let mut records = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let Some(id) = Self::id_from_path(&path) else {
                continue;
            };
            let json = std::fs::read_to_string(&path)?;
            let record: AnnotationRecord = serde_json::from_str(&json)?;
            if record.id != id {
                return Err(PersistError::Rejected(format!(
                    "{:?} holds annotation {}",
                    path, record.id
                )));
            }
            records.push(record);
        }
        records.sort_by_key(|r| r.id);
        Ok(records)
    }
}

/// In-memory store, shared between clones.
#[derive(Debug, Clone, Default)]
pub struct MemorySequenceStore {
    records: Arc<Mutex<BTreeMap<AnnotationId, SequenceRecord>>>,
}

impl MemorySequenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: AnnotationId) -> Option<SequenceRecord> {
        self.records.lock().ok()?.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<AnnotationId, SequenceRecord>>, PersistError>
    {
        self.records
            .lock()
            .map_err(|_| PersistError::Rejected("store lock poisoned".to_string()))
    }
}

impl SequenceStore for MemorySequenceStore {
    fn save(&mut self, id: AnnotationId, record: &SequenceRecord) -> Result<(), PersistError> {
        self.lock()?.insert(id, record.clone());
        Ok(())
    }

    fn delete(&mut self, id: AnnotationId) -> Result<(), PersistError> {
        self.lock()?.remove(&id);
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<AnnotationRecord>, PersistError> {
        Ok(self
            .lock()?
            .iter()
            .map(|(id, record)| AnnotationRecord {
                id: *id,
                bounding_box_sequence: record.clone(),
            })
            .collect())
    }
}
