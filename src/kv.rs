// String-keyed persistent storage backends

use eyre::{Context, Result, eyre};
use fs2::FileExt;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

const CURRENT_VERSION: u32 = 1;
const STORE_DIR: &str = ".todo-atlas";

/// Persistent string-keyed storage
pub trait KeyValueStore {
    /// Read the value stored under `key`, `None` if absent
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`; removing an absent key is not an error
    fn remove(&mut self, key: &str) -> Result<()>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

/// Which backend to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// One JSON file per key
    #[default]
    File,
    /// SQLite `kv` table
    Sqlite,
    /// In-process only, nothing survives exit
    Memory,
}

/// Open the chosen backend rooted at `path`
pub fn open_backend(backend: Backend, path: &Path) -> Result<Box<dyn KeyValueStore>> {
    let store: Box<dyn KeyValueStore> = match backend {
        Backend::File => Box::new(FileStore::open(path)?),
        Backend::Sqlite => Box::new(SqliteStore::open(path)?),
        Backend::Memory => Box::new(MemoryStore::new()),
    };
    Ok(store)
}

// ============================================================================
// MemoryStore
// ============================================================================

/// In-process store with an optional byte quota.
///
/// Clones share the same map, so a value saved through one handle can be
/// loaded through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<HashMap<String, String>>>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes that would push keys+values past `bytes`
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            entries: Rc::default(),
            quota: Some(bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    fn used_bytes_without(&self, key: &str) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if let Some(quota) = self.quota {
            let needed = self.used_bytes_without(key) + key.len() + value.len();
            if needed > quota {
                return Err(eyre!("Quota exceeded: {} bytes needed, {} allowed", needed, quota));
            }
        }
        self.entries.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

// ============================================================================
// FileStore
// ============================================================================

/// One `{key}.json` file per key inside a `.todo-atlas` directory
#[derive(Debug)]
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    /// Open or create a store at the given path
    ///
    /// Values live in a `.todo-atlas` subdirectory of the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref().join(STORE_DIR);
        fs::create_dir_all(&base_path).context("Failed to create store directory")?;
        write_version(&base_path)?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn value_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.base_path.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.value_path(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let value = fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Some(value))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.value_path(key)?;
        let tmp_path = self.base_path.join(format!("{}.json.tmp", key));
        let lock_path = self.base_path.join(format!("{}.lock", key));

        // Serializes writers; readers never see a partial value because the
        // value file is only ever replaced by rename.
        let lock = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .context("Failed to open lock file")?;
        lock.lock_exclusive().context("Failed to acquire file lock")?;

        let mut tmp = fs::File::create(&tmp_path).context("Failed to create temporary value file")?;
        if let Err(e) = tmp.write_all(value.as_bytes()).and_then(|_| tmp.sync_all()) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e).context("Failed to write temporary value file");
        }
        drop(tmp);

        fs::rename(&tmp_path, &path).with_context(|| format!("Failed to replace {}", path.display()))?;

        debug!(key, bytes = value.len(), "FileStore::set: wrote value");
        // Lock is automatically released when the lock file is dropped
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let path = self.value_path(key)?;
        if path.exists() {
            fs::remove_file(&path).with_context(|| format!("Failed to remove {}", path.display()))?;
        }
        Ok(())
    }
}

// ============================================================================
// SqliteStore
// ============================================================================

/// Key-value table in a SQLite database
pub struct SqliteStore {
    db: Connection,
}

impl SqliteStore {
    /// Open or create `.todo-atlas/todo-atlas.db` under the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref().join(STORE_DIR);
        fs::create_dir_all(&base_path).context("Failed to create store directory")?;

        let db_path = base_path.join("todo-atlas.db");
        let db = Connection::open(&db_path).context("Failed to open SQLite database")?;

        let store = Self { db };
        store.create_schema()?;
        create_gitignore(&base_path)?;
        write_version(&base_path)?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let store = Self { db };
        store.create_schema()?;
        Ok(store)
    }

    fn create_schema(&self) -> Result<()> {
        debug!("Creating database schema");

        self.db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;

        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .db
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get::<_, String>(0))
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        self.db.execute(
            "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![key, value, crate::now_ms()],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.db.execute("DELETE FROM kv WHERE key = ?1", [key])?;
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn create_gitignore(base_path: &Path) -> Result<()> {
    let gitignore_path = base_path.join(".gitignore");
    if !gitignore_path.exists() {
        fs::write(gitignore_path, "todo-atlas.db\ntodo-atlas.db-shm\ntodo-atlas.db-wal\n")?;
    }
    Ok(())
}

fn write_version(base_path: &Path) -> Result<()> {
    let version_path = base_path.join(".version");
    if !version_path.exists() {
        fs::write(version_path, CURRENT_VERSION.to_string())?;
    }
    Ok(())
}

/// Keys double as file names, so keep them to a safe alphabet
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(eyre!("Key cannot be empty"));
    }
    if key.len() > 128 {
        return Err(eyre!("Key too long: {} (max 128 chars)", key));
    }
    if key.starts_with('.') {
        return Err(eyre!("Key cannot start with '.': {}", key));
    }
    if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.') {
        return Err(eyre!("Invalid key: {} (must be alphanumeric with _/-/.)", key));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exercise(store: &mut dyn KeyValueStore) {
        assert_eq!(store.get("todo-atlas-v1").unwrap(), None);

        store.set("todo-atlas-v1", "[1,2]").unwrap();
        assert_eq!(store.get("todo-atlas-v1").unwrap().as_deref(), Some("[1,2]"));

        // Shorter value must fully replace the longer one
        store.set("todo-atlas-v1", "[]").unwrap();
        assert_eq!(store.get("todo-atlas-v1").unwrap().as_deref(), Some("[]"));

        store.remove("todo-atlas-v1").unwrap();
        assert_eq!(store.get("todo-atlas-v1").unwrap(), None);
        store.remove("todo-atlas-v1").unwrap();
    }

    #[test]
    fn test_memory_store_basic() {
        exercise(&mut MemoryStore::new());
    }

    #[test]
    fn test_file_store_basic() {
        let temp = TempDir::new().unwrap();
        exercise(&mut FileStore::open(temp.path()).unwrap());
    }

    #[test]
    fn test_sqlite_store_basic() {
        exercise(&mut SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn test_memory_store_clones_share_entries() {
        let mut store = MemoryStore::new();
        let other = store.clone();
        store.set("k", "v").unwrap();
        assert_eq!(other.get("k").unwrap().as_deref(), Some("v"));
        assert_eq!(other.len(), 1);
    }

    #[test]
    fn test_memory_store_quota() {
        let mut store = MemoryStore::with_quota(10);
        store.set("k", "123456789").unwrap();
        assert!(store.set("k", "1234567890").is_err());
        // Failed write leaves the previous value
        assert_eq!(store.get("k").unwrap().as_deref(), Some("123456789"));
        // Replacing a key doesn't double count it
        store.set("k", "short").unwrap();
    }

    #[test]
    fn test_file_store_open_creates_directory() {
        let temp = TempDir::new().unwrap();

        let store = FileStore::open(temp.path()).unwrap();
        let store_path = temp.path().join(".todo-atlas");
        assert_eq!(store.base_path(), store_path.as_path());
        assert!(store_path.join(".version").exists());
    }

    #[test]
    fn test_file_store_persists_across_reopen() {
        let temp = TempDir::new().unwrap();
        {
            let mut store = FileStore::open(temp.path()).unwrap();
            store.set("todo-atlas-v1", "[\"x\"]").unwrap();
        }
        let store = FileStore::open(temp.path()).unwrap();
        assert_eq!(store.get("todo-atlas-v1").unwrap().as_deref(), Some("[\"x\"]"));
        assert!(temp.path().join(".todo-atlas/todo-atlas-v1.json").exists());
    }

    #[test]
    fn test_sqlite_store_persists_across_reopen() {
        let temp = TempDir::new().unwrap();
        {
            let mut store = SqliteStore::open(temp.path()).unwrap();
            store.set("todo-atlas-v1", "[]").unwrap();
        }
        let store = SqliteStore::open(temp.path()).unwrap();
        assert_eq!(store.get("todo-atlas-v1").unwrap().as_deref(), Some("[]"));

        let store_path = temp.path().join(".todo-atlas");
        assert!(store_path.join("todo-atlas.db").exists());
        assert!(store_path.join(".gitignore").exists());
    }

    #[test]
    fn test_open_backend() {
        let temp = TempDir::new().unwrap();
        for backend in [Backend::File, Backend::Sqlite, Backend::Memory] {
            let mut store = open_backend(backend, temp.path()).unwrap();
            store.set("k", "v").unwrap();
            assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        }
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("todo-atlas-v1").is_ok());
        assert!(validate_key("a.b_c").is_ok());

        assert!(validate_key("").is_err());
        assert!(validate_key("../escape").is_err());
        assert!(validate_key(".hidden").is_err());
        assert!(validate_key("with space").is_err());
        assert!(validate_key(&"a".repeat(129)).is_err());
    }

    #[test]
    fn test_file_store_failed_write_keeps_previous_value() {
        let temp = TempDir::new().unwrap();
        let mut store = FileStore::open(temp.path()).unwrap();
        store.set("todo-atlas-v1", "[\"old\"]").unwrap();

        // A directory in the temp file's place makes the next write fail
        fs::create_dir(store.base_path().join("todo-atlas-v1.json.tmp")).unwrap();
        assert!(store.set("todo-atlas-v1", &"x".repeat(32 * 1024)).is_err());

        assert_eq!(store.get("todo-atlas-v1").unwrap().as_deref(), Some("[\"old\"]"));
    }

    #[test]
    fn test_file_store_set_leaves_no_temp_file() {
        let temp = TempDir::new().unwrap();
        let mut store = FileStore::open(temp.path()).unwrap();
        store.set("todo-atlas-v1", "[]").unwrap();

        assert!(!store.base_path().join("todo-atlas-v1.json.tmp").exists());
        assert!(store.base_path().join("todo-atlas-v1.json").exists());
    }

    #[test]
    fn test_file_store_rejects_bad_key() {
        let temp = TempDir::new().unwrap();
        let mut store = FileStore::open(temp.path()).unwrap();
        assert!(store.set("../x", "v").is_err());
        assert!(store.get("a/b").is_err());
    }
}
