//! Feedback persistence — one named slot in a key-value local storage.
//!
//! The slot holds the whole feedback sequence as a JSON array. Every write
//! replaces the sequence wholesale; there is no per-record update.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::PulseError;
use crate::models::FeedbackRecord;

/// Name of the slot holding the serialized feedback sequence.
pub const FEEDBACK_SLOT: &str = "culture_pulse_data";

// ============================================================================
// KeyValueStorage trait
// ============================================================================

/// Abstraction over the local key-value persistence medium.
pub trait KeyValueStorage: Send + Sync {
    /// Read a slot. `Ok(None)` when the slot has never been written.
    fn get(&self, key: &str) -> Result<Option<String>, PulseError>;

    /// Whether a slot has been written, regardless of whether it reads back.
    fn exists(&self, key: &str) -> Result<bool, PulseError>;

    /// Overwrite a slot. Readers never observe a partial write.
    fn set(&self, key: &str, value: &str) -> Result<(), PulseError>;
}

// ============================================================================
// FileStorage
// ============================================================================

/// One `<key>.json` file per slot under a data directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, PulseError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, PulseError> {
        match fs::read_to_string(self.slot_path(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, key: &str) -> Result<bool, PulseError> {
        Ok(self.slot_path(key).try_exists()?)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PulseError> {
        let path = self.slot_path(key);
        let tmp = self.dir.join(format!(".{}.json.tmp", key));
        fs::write(&tmp, value)?;
        // rename is atomic on the same filesystem
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

// ============================================================================
// MemoryStorage
// ============================================================================

/// Process-local storage, for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, PulseError> {
        let slots = self
            .slots
            .lock()
            .map_err(|e| PulseError::Storage(e.to_string()))?;
        Ok(slots.get(key).cloned())
    }

    fn exists(&self, key: &str) -> Result<bool, PulseError> {
        let slots = self
            .slots
            .lock()
            .map_err(|e| PulseError::Storage(e.to_string()))?;
        Ok(slots.contains_key(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PulseError> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|e| PulseError::Storage(e.to_string()))?;
        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ============================================================================
// FeedbackStore
// ============================================================================

/// Ordered, append-only feedback sequence on top of a `KeyValueStorage`.
#[derive(Clone)]
pub struct FeedbackStore {
    storage: Arc<dyn KeyValueStorage>,
    write_lock: Arc<Mutex<()>>,
}

impl FeedbackStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            storage,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Whether the slot has ever been written. An empty array counts, and so
    /// does a slot whose contents cannot be read or parsed.
    pub fn has_data(&self) -> Result<bool, PulseError> {
        self.storage.exists(FEEDBACK_SLOT)
    }

    /// Persisted sequence in insertion order. Absent, unreadable or corrupt
    /// data yields an empty sequence.
    pub fn load(&self) -> Vec<FeedbackRecord> {
        let raw = match self.storage.get(FEEDBACK_SLOT) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, slot = FEEDBACK_SLOT, "Failed to read feedback slot");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<FeedbackRecord>>(&raw) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    slot = FEEDBACK_SLOT,
                    "Persisted feedback is malformed, treating as empty"
                );
                Vec::new()
            }
        }
    }

    pub fn save(&self, records: &[FeedbackRecord]) -> Result<(), PulseError> {
        let raw = serde_json::to_string(records)?;
        self.storage.set(FEEDBACK_SLOT, &raw)
    }

    pub fn append(&self, record: FeedbackRecord) -> Result<Vec<FeedbackRecord>, PulseError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| PulseError::Storage(e.to_string()))?;
        let mut records = self.load();
        records.push(record);
        self.save(&records)?;
        tracing::debug!(total = records.len(), "Appended feedback record");
        Ok(records)
    }

    /// Irreversibly empties the store.
    pub fn clear(&self) -> Result<(), PulseError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| PulseError::Storage(e.to_string()))?;
        self.save(&[])?;
        tracing::info!("Feedback store cleared");
        Ok(())
    }
}
