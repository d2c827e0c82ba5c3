//! Best-effort persistence of table state to a local key-value slot.
//!
//! Only the slice worth keeping survives a restart: the raw user records,
//! the column order, and the sort configuration. The pagination cursor, the
//! derived display collection, and the loading/error flags are deliberately
//! never written. The adapter is fire-and-forget: write failures are
//! swallowed (routed to an optional error hook, else logged) and a missing
//! or malformed slot simply reads as "no prior state". Last writer wins; the
//! single mutation thread makes locking unnecessary.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sort::SortConfig;
use crate::user::User;

/// The fixed slot key under which table state is cached.
pub const STORAGE_KEY: &str = "_user_data_cache";

/// Failure modes of the storage boundary. Never propagated past the
/// adapter; recovery is always "treat as absent" or "drop the write".
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The slot could not be read.
    #[error("failed to read persisted table state: {0}")]
    Read(String),
    /// The slot could not be written.
    #[error("failed to write persisted table state: {0}")]
    Write(String),
}

/// The persisted slice of table state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedTable {
    /// The raw fetched records.
    #[serde(default)]
    pub users: Vec<User>,
    /// Column order as stored identifiers, unvalidated.
    #[serde(default)]
    pub column_order: Vec<String>,
    /// The active sort, if any.
    #[serde(default)]
    pub sort_config: Option<SortConfig>,
}

/// A durable slot of string values addressed by key.
pub trait SlotStore: Send + Sync {
    /// Reads a slot; `Ok(None)` when the slot has never been written.
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    /// Writes a slot, replacing any previous value.
    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
}

/// Slot store backed by one JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileSlotStore {
    dir: PathBuf,
}

impl FileSlotStore {
    /// Creates a store rooted at the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Creates a store in the platform-local data directory, falling back
    /// to the current directory when no home is available.
    pub fn in_default_location() -> Self {
        let dir = directories::ProjectDirs::from("com", "whit3rabbit", "bubbletea-usergrid")
            .map(|dirs| dirs.data_local_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        Self { dir }
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl SlotStore for FileSlotStore {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        match fs::read_to_string(self.slot_path(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(PersistenceError::Read(err.to_string())),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.dir).map_err(|err| PersistenceError::Write(err.to_string()))?;
        fs::write(self.slot_path(key), value)
            .map_err(|err| PersistenceError::Write(err.to_string()))
    }
}

/// In-memory slot store for tests and demos, with injectable write failure.
#[derive(Debug, Default)]
pub struct MemorySlotStore {
    slots: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemorySlotStore {
    /// An empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail (or succeed again) until changed.
    pub fn set_failing_writes(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    /// Returns the raw slot contents, if any.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.slots.lock().ok()?.get(key).cloned()
    }
}

impl SlotStore for MemorySlotStore {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let slots = self
            .slots
            .lock()
            .map_err(|_| PersistenceError::Read("slot mutex poisoned".to_string()))?;
        Ok(slots.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::Write("quota exceeded".to_string()));
        }
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| PersistenceError::Write("slot mutex poisoned".to_string()))?;
        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

type ErrorHook = Box<dyn Fn(&PersistenceError) + Send + Sync>;

/// The persistence adapter the table store writes through.
///
/// `save` runs as a side effect of every store mutation and `load` once at
/// store construction. Neither ever surfaces an error to the caller: the
/// optional error hook lets the host wire failures into its own logging,
/// and without one they go to [`log::warn!`].
pub struct TableCache {
    store: Arc<dyn SlotStore>,
    error_hook: Option<ErrorHook>,
}

impl fmt::Debug for TableCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableCache")
            .field("key", &STORAGE_KEY)
            .field("has_error_hook", &self.error_hook.is_some())
            .finish()
    }
}

impl TableCache {
    /// Wraps a slot store under the fixed [`STORAGE_KEY`].
    pub fn new(store: Arc<dyn SlotStore>) -> Self {
        Self {
            store,
            error_hook: None,
        }
    }

    /// Routes swallowed persistence failures to the host (builder pattern).
    pub fn with_error_hook(
        mut self,
        hook: impl Fn(&PersistenceError) + Send + Sync + 'static,
    ) -> Self {
        self.error_hook = Some(Box::new(hook));
        self
    }

    fn report(&self, err: &PersistenceError) {
        match &self.error_hook {
            Some(hook) => hook(err),
            None => log::warn!("{err}"),
        }
    }

    /// Persists the state slice. Failures are swallowed.
    pub fn save(&self, state: &PersistedTable) {
        let payload = serde_json::json!({ "table": state });
        let serialized = match serde_json::to_string(&payload) {
            Ok(serialized) => serialized,
            Err(err) => {
                self.report(&PersistenceError::Write(err.to_string()));
                return;
            }
        };
        if let Err(err) = self.store.write(STORAGE_KEY, &serialized) {
            self.report(&err);
        }
    }

    /// Loads the persisted slice, treating anything unusable as absent.
    ///
    /// A slot is usable only when it parses as JSON, carries a `table`
    /// object, and that object's `users` field is an array.
    pub fn load(&self) -> Option<PersistedTable> {
        let raw = match self.store.read(STORAGE_KEY) {
            Ok(raw) => raw?,
            Err(err) => {
                self.report(&err);
                return None;
            }
        };
        decode_slot(&raw)
    }
}

fn decode_slot(raw: &str) -> Option<PersistedTable> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    let table = value.get("table")?;
    if !table.get("users").is_some_and(serde_json::Value::is_array) {
        return None;
    }
    serde_json::from_value(table.clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{default_column_order, ColumnId};
    use crate::sort::{SortConfig, SortDirection};
    use crate::source::MockDataSource;
    use std::sync::atomic::AtomicUsize;

    fn sample_state() -> PersistedTable {
        PersistedTable {
            users: (0..3).map(MockDataSource::generate_user).collect(),
            column_order: default_column_order(),
            sort_config: Some(SortConfig::new(ColumnId::City, SortDirection::Desc)),
        }
    }

    #[test]
    fn test_round_trip_reproduces_slice_exactly() {
        let store = Arc::new(MemorySlotStore::new());
        let cache = TableCache::new(store.clone());
        let state = sample_state();

        cache.save(&state);
        let loaded = cache.load().unwrap();
        assert_eq!(loaded, state);

        // Only the slice is written; no cursor or flags sneak in.
        let raw = store.raw(STORAGE_KEY).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let table = value.get("table").unwrap();
        assert!(table.get("pagination").is_none());
        assert!(table.get("loading").is_none());
        assert!(table.get("error").is_none());
    }

    #[test]
    fn test_absent_slot_reads_as_none() {
        let cache = TableCache::new(Arc::new(MemorySlotStore::new()));
        assert!(cache.load().is_none());
    }

    #[test]
    fn test_unparsable_slot_reads_as_none() {
        let store = Arc::new(MemorySlotStore::new());
        store.write(STORAGE_KEY, "{not json at all").unwrap();
        let cache = TableCache::new(store);
        assert!(cache.load().is_none());
    }

    #[test]
    fn test_non_array_users_reads_as_none() {
        let store = Arc::new(MemorySlotStore::new());
        store
            .write(STORAGE_KEY, r#"{"table":{"users":"oops","columnOrder":[]}}"#)
            .unwrap();
        let cache = TableCache::new(store);
        assert!(cache.load().is_none());
    }

    #[test]
    fn test_missing_table_object_reads_as_none() {
        let store = Arc::new(MemorySlotStore::new());
        store.write(STORAGE_KEY, r#"{"something":"else"}"#).unwrap();
        let cache = TableCache::new(store);
        assert!(cache.load().is_none());
    }

    #[test]
    fn test_null_sort_config_round_trips() {
        let store = Arc::new(MemorySlotStore::new());
        let cache = TableCache::new(store);
        let state = PersistedTable {
            sort_config: None,
            ..sample_state()
        };
        cache.save(&state);
        assert_eq!(cache.load().unwrap().sort_config, None);
    }

    #[test]
    fn test_write_failure_is_swallowed_and_reported() {
        let store = Arc::new(MemorySlotStore::new());
        store.set_failing_writes(true);

        let reported = Arc::new(AtomicUsize::new(0));
        let seen = reported.clone();
        let cache = TableCache::new(store.clone()).with_error_hook(move |err| {
            assert!(matches!(err, PersistenceError::Write(_)));
            seen.fetch_add(1, Ordering::SeqCst);
        });

        cache.save(&sample_state());
        assert_eq!(reported.load(Ordering::SeqCst), 1);
        assert!(store.raw(STORAGE_KEY).is_none());
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = std::env::temp_dir().join(format!(
            "usergrid-slot-test-{}-{:?}",
            std::process::id(),
            std::thread::current().id()
        ));
        let store = FileSlotStore::new(&dir);

        assert!(store.read(STORAGE_KEY).unwrap().is_none());
        store.write(STORAGE_KEY, r#"{"table":{"users":[]}}"#).unwrap();
        assert_eq!(
            store.read(STORAGE_KEY).unwrap().as_deref(),
            Some(r#"{"table":{"users":[]}}"#)
        );

        let _ = fs::remove_dir_all(&dir);
    }
}
