//! Garden persistence.
//!
//! A user's ledger and plants live in one document so a session's changes
//! land in a single atomic write. Writers are serialised with an optimistic
//! version check on the ledger.

use crate::{Error, GardenLedger, Plant, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Storage backend for gardens
pub trait GardenStore: Send + Sync {
    /// Ledger for a user, or `None` if they have never been seen
    fn load_ledger(&self, user_id: &str) -> Result<Option<GardenLedger>>;

    fn load_plant(&self, user_id: &str, tile_index: u32) -> Result<Option<Plant>>;

    /// All plants for a user, ordered by tile
    fn list_plants(&self, user_id: &str) -> Result<Vec<Plant>>;

    /// Atomically write a ledger and at most one plant
    ///
    /// Fails with `ConcurrentModification` unless the stored ledger version
    /// (0 when absent) equals `ledger.version`. Returns the new version.
    fn commit(&self, ledger: &GardenLedger, plant: Option<&Plant>) -> Result<u64>;
}

impl<T: GardenStore + ?Sized> GardenStore for Arc<T> {
    fn load_ledger(&self, user_id: &str) -> Result<Option<GardenLedger>> {
        (**self).load_ledger(user_id)
    }

    fn load_plant(&self, user_id: &str, tile_index: u32) -> Result<Option<Plant>> {
        (**self).load_plant(user_id, tile_index)
    }

    fn list_plants(&self, user_id: &str) -> Result<Vec<Plant>> {
        (**self).list_plants(user_id)
    }

    fn commit(&self, ledger: &GardenLedger, plant: Option<&Plant>) -> Result<u64> {
        (**self).commit(ledger, plant)
    }
}

/// Everything persisted for one user
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct GardenDocument {
    ledger: Option<GardenLedger>,
    #[serde(default)]
    plants: BTreeMap<u32, Plant>,
}

impl GardenDocument {
    fn stored_version(&self) -> u64 {
        self.ledger.as_ref().map(|l| l.version).unwrap_or(0)
    }

    /// Apply a commit in place, checking the version token first
    fn apply(&mut self, ledger: &GardenLedger, plant: Option<&Plant>) -> Result<u64> {
        let stored = self.stored_version();
        if stored != ledger.version {
            tracing::debug!(
                "Version conflict for {}: stored {}, writer saw {}",
                ledger.user_id,
                stored,
                ledger.version
            );
            return Err(Error::ConcurrentModification);
        }
        if let Some(plant) = plant {
            if plant.user_id != ledger.user_id {
                return Err(Error::InvalidRequest(format!(
                    "plant belongs to '{}', not '{}'",
                    plant.user_id, ledger.user_id
                )));
            }
            self.plants.insert(plant.tile_index, plant.clone());
        }

        let mut next = ledger.clone();
        next.version = stored + 1;
        self.ledger = Some(next);
        Ok(stored + 1)
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Thread-safe in-memory store, used by tests and embedders
#[derive(Debug, Default)]
pub struct MemoryStore {
    gardens: RwLock<HashMap<String, GardenDocument>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> Error {
        Error::State("memory store lock poisoned".into())
    }
}

impl GardenStore for MemoryStore {
    fn load_ledger(&self, user_id: &str) -> Result<Option<GardenLedger>> {
        let gardens = self.gardens.read().map_err(|_| Self::poisoned())?;
        Ok(gardens.get(user_id).and_then(|doc| doc.ledger.clone()))
    }

    fn load_plant(&self, user_id: &str, tile_index: u32) -> Result<Option<Plant>> {
        let gardens = self.gardens.read().map_err(|_| Self::poisoned())?;
        Ok(gardens
            .get(user_id)
            .and_then(|doc| doc.plants.get(&tile_index).cloned()))
    }

    fn list_plants(&self, user_id: &str) -> Result<Vec<Plant>> {
        let gardens = self.gardens.read().map_err(|_| Self::poisoned())?;
        Ok(gardens
            .get(user_id)
            .map(|doc| doc.plants.values().cloned().collect())
            .unwrap_or_default())
    }

    fn commit(&self, ledger: &GardenLedger, plant: Option<&Plant>) -> Result<u64> {
        let mut gardens = self.gardens.write().map_err(|_| Self::poisoned())?;
        let doc = gardens.entry(ledger.user_id.clone()).or_default();

        // Apply to a copy so a rejected commit leaves nothing behind
        let mut updated = doc.clone();
        let version = updated.apply(ledger, plant)?;
        *doc = updated;
        Ok(version)
    }
}

// ============================================================================
// File-backed store
// ============================================================================

/// JSON document per user under `<root>/gardens/`, guarded by a lock file
#[derive(Clone, Debug)]
pub struct FileStore {
    root: PathBuf,
    lock_timeout: Duration,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>, lock_timeout: Duration) -> Self {
        Self {
            root: root.into(),
            lock_timeout,
        }
    }

    fn gardens_dir(&self) -> PathBuf {
        self.root.join("gardens")
    }

    fn document_path(&self, user_id: &str) -> Result<PathBuf> {
        validate_user_id(user_id)?;
        Ok(self.gardens_dir().join(format!("{}.json", user_id)))
    }

    fn lock_path(&self, user_id: &str) -> Result<PathBuf> {
        validate_user_id(user_id)?;
        Ok(self.gardens_dir().join(format!("{}.lock", user_id)))
    }

    fn open_lock(&self, user_id: &str) -> Result<File> {
        let path = self.lock_path(user_id)?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        Ok(file)
    }

    /// Read a user's document under a shared lock
    fn read_locked(&self, user_id: &str) -> Result<GardenDocument> {
        let path = self.document_path(user_id)?;
        if !path.exists() {
            return Ok(GardenDocument::default());
        }

        let lock = self.open_lock(user_id)?;
        lock_with_timeout(&lock, false, self.lock_timeout)?;
        let result = read_document(&path);
        release_lock(lock, user_id);
        result
    }
}

impl GardenStore for FileStore {
    fn load_ledger(&self, user_id: &str) -> Result<Option<GardenLedger>> {
        Ok(self.read_locked(user_id)?.ledger)
    }

    fn load_plant(&self, user_id: &str, tile_index: u32) -> Result<Option<Plant>> {
        Ok(self.read_locked(user_id)?.plants.remove(&tile_index))
    }

    fn list_plants(&self, user_id: &str) -> Result<Vec<Plant>> {
        Ok(self.read_locked(user_id)?.plants.into_values().collect())
    }

    fn commit(&self, ledger: &GardenLedger, plant: Option<&Plant>) -> Result<u64> {
        let path = self.document_path(&ledger.user_id)?;
        let dir = self.gardens_dir();
        std::fs::create_dir_all(&dir)?;

        let lock = self.open_lock(&ledger.user_id)?;
        lock_with_timeout(&lock, true, self.lock_timeout)?;

        let result = commit_document(&dir, &path, ledger, plant);
        release_lock(lock, &ledger.user_id);

        if let Ok(version) = result {
            tracing::debug!(
                "Committed garden for {} at version {}",
                ledger.user_id,
                version
            );
        }
        result
    }
}

/// User ids become file names, so keep them to a safe alphabet
fn validate_user_id(user_id: &str) -> Result<()> {
    let valid = !user_id.is_empty()
        && user_id.len() <= 128
        && !user_id.starts_with('.')
        && user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'));
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidRequest(format!("invalid user id '{}'", user_id)))
    }
}

/// Unlock and close; closing the handle drops the lock even if unlock fails
fn release_lock(lock: File, user_id: &str) {
    if let Err(e) = FileExt::unlock(&lock) {
        tracing::warn!("Failed to unlock garden for {}: {}", user_id, e);
    }
}

fn lock_with_timeout(file: &File, exclusive: bool, timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        let attempt = if exclusive {
            FileExt::try_lock_exclusive(file)
        } else {
            FileExt::try_lock_shared(file)
        };

        match attempt {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                if Instant::now() >= deadline {
                    tracing::warn!("Gave up waiting for garden lock after {:?}", timeout);
                    return Err(Error::Timeout);
                }
                std::thread::sleep(LOCK_POLL_INTERVAL);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn read_document(path: &Path) -> Result<GardenDocument> {
    let mut contents = String::new();
    match File::open(path) {
        Ok(file) => {
            std::io::BufReader::new(file).read_to_string(&mut contents)?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(GardenDocument::default());
        }
        Err(e) => return Err(e.into()),
    }

    serde_json::from_str(&contents)
        .map_err(|e| Error::State(format!("corrupt garden file {:?}: {}", path, e)))
}

/// Read-modify-write of one document; caller holds the exclusive lock
fn commit_document(
    dir: &Path,
    path: &Path,
    ledger: &GardenLedger,
    plant: Option<&Plant>,
) -> Result<u64> {
    let mut doc = read_document(path)?;
    let version = doc.apply(ledger, plant)?;
    write_document(dir, path, &doc)?;
    Ok(version)
}

/// Atomically replace the document: temp file, fsync, rename
fn write_document(dir: &Path, path: &Path, doc: &GardenDocument) -> Result<()> {
    let temp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = std::io::BufWriter::new(temp.as_file());
        let contents = serde_json::to_string(doc)?;
        writer.write_all(contents.as_bytes())?;
        writer.flush()?;
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GardenConfig;
    use chrono::Utc;

    fn ledger(user: &str) -> GardenLedger {
        GardenLedger::new(user, &GardenConfig::default(), Utc::now())
    }

    /// Shared checks every store must pass
    fn check_store_contract<S: GardenStore>(store: &S) {
        assert!(store.load_ledger("ada").unwrap().is_none());
        assert!(store.list_plants("ada").unwrap().is_empty());

        let mut ledger = ledger("ada");
        ledger.dew_balance = 7;
        let plant = Plant::seed("ada", "pine-tree", 0, Utc::now());

        let version = store.commit(&ledger, Some(&plant)).unwrap();
        assert_eq!(version, 1);

        let loaded = store.load_ledger("ada").unwrap().unwrap();
        assert_eq!(loaded.dew_balance, 7);
        assert_eq!(loaded.version, 1);
        assert_eq!(store.load_plant("ada", 0).unwrap(), Some(plant));
        assert!(store.load_plant("ada", 1).unwrap().is_none());

        // Stale writer loses
        ledger.dew_balance = 99;
        assert!(matches!(
            store.commit(&ledger, None),
            Err(Error::ConcurrentModification)
        ));
        assert_eq!(store.load_ledger("ada").unwrap().unwrap().dew_balance, 7);

        // Fresh writer wins
        let mut fresh = store.load_ledger("ada").unwrap().unwrap();
        fresh.dew_balance = 12;
        assert_eq!(store.commit(&fresh, None).unwrap(), 2);
        assert_eq!(store.load_ledger("ada").unwrap().unwrap().dew_balance, 12);

        // Other users are isolated
        assert!(store.load_ledger("grace").unwrap().is_none());
    }

    #[test]
    fn test_memory_store_contract() {
        check_store_contract(&MemoryStore::new());
    }

    #[test]
    fn test_file_store_contract() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path(), Duration::from_millis(500));
        check_store_contract(&store);
    }

    #[test]
    fn test_arc_store_delegates() {
        let store = Arc::new(MemoryStore::new());
        let shared: Arc<dyn GardenStore> = store.clone();
        shared.commit(&ledger("ada"), None).unwrap();
        assert!(store.load_ledger("ada").unwrap().is_some());
    }

    #[test]
    fn test_rejects_plant_for_other_user() {
        let store = MemoryStore::new();
        let plant = Plant::seed("grace", "pine-tree", 0, Utc::now());
        assert!(matches!(
            store.commit(&ledger("ada"), Some(&plant)),
            Err(Error::InvalidRequest(_))
        ));
        assert!(store.load_ledger("ada").unwrap().is_none());
    }

    #[test]
    fn test_file_store_rejects_path_like_user_ids() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path(), Duration::from_millis(500));
        for bad in ["", "../etc", "a/b", ".hidden"] {
            assert!(
                matches!(store.load_ledger(bad), Err(Error::InvalidRequest(_))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_file_store_corrupt_document_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path(), Duration::from_millis(500));
        std::fs::create_dir_all(temp_dir.path().join("gardens")).unwrap();
        std::fs::write(temp_dir.path().join("gardens/ada.json"), "{ invalid json }").unwrap();

        assert!(matches!(store.load_ledger("ada"), Err(Error::State(_))));
    }

    #[test]
    fn test_file_store_times_out_on_held_lock() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path(), Duration::from_millis(50));
        store.commit(&ledger("ada"), None).unwrap();

        let fresh = store.load_ledger("ada").unwrap().unwrap();

        // A second handle on the lock file can't get in
        let holder = store.open_lock("ada").unwrap();
        FileExt::lock_exclusive(&holder).unwrap();
        let result = store.commit(&fresh, None);
        assert!(matches!(result, Err(Error::Timeout)));

        FileExt::unlock(&holder).unwrap();
        assert_eq!(store.commit(&fresh, None).unwrap(), 2);
    }

    #[test]
    fn test_file_store_releases_lock_after_commit() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path(), Duration::from_millis(50));
        store.commit(&ledger("ada"), None).unwrap();
        store.load_ledger("ada").unwrap();

        let other = store.open_lock("ada").unwrap();
        FileExt::try_lock_exclusive(&other).unwrap();
        FileExt::unlock(&other).unwrap();
    }

    #[test]
    fn test_file_store_leaves_no_temp_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path(), Duration::from_millis(500));
        store.commit(&ledger("ada"), None).unwrap();

        let mut names: Vec<_> = std::fs::read_dir(temp_dir.path().join("gardens"))
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["ada.json", "ada.lock"]);
    }
}
