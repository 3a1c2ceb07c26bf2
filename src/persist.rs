// Best-effort persistence of the to-do list
//
// Storage problems never reach the caller: they degrade to "no prior data"
// and are only logged.

use crate::id::{Clock, IdGenerator};
use crate::kv::KeyValueStore;
use crate::models::Todo;
use crate::record;
use tracing::{debug, warn};

/// Key the list is stored under unless configured otherwise
pub const DEFAULT_STORAGE_KEY: &str = "todo-atlas-v1";

/// Load the list stored under `key`, or an empty list on any failure
pub fn load_todos(store: Option<&dyn KeyValueStore>, key: &str, ids: &IdGenerator, clock: &dyn Clock) -> Vec<Todo> {
    let Some(store) = store else {
        debug!(key, "load_todos: no store available");
        return Vec::new();
    };

    // Read errors are swallowed on purpose; they look like an empty store.
    let raw = match store.get(key) {
        Ok(Some(raw)) if !raw.is_empty() => raw,
        Ok(_) => return Vec::new(),
        Err(e) => {
            warn!(key, error = ?e, "Failed to read stored todos, starting empty");
            return Vec::new();
        }
    };

    match record::decode_list(&raw, ids, clock) {
        Ok(todos) => {
            debug!(key, count = todos.len(), "Loaded todos");
            todos
        }
        Err(e) => {
            warn!(key, error = ?e, "Stored todos are unreadable, starting empty");
            Vec::new()
        }
    }
}

/// Write the whole list under `key`; failures are logged and dropped
pub fn save_todos<S: KeyValueStore + ?Sized>(store: Option<&mut S>, key: &str, todos: &[Todo]) {
    let Some(store) = store else {
        return;
    };

    let json = match serde_json::to_string(todos) {
        Ok(json) => json,
        Err(e) => {
            warn!(key, error = ?e, "Failed to serialize todos");
            return;
        }
    };

    // Write errors (quota, I/O) are swallowed on purpose; no retry.
    if let Err(e) = store.set(key, &json) {
        warn!(key, error = ?e, "Failed to save todos");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::FixedClock;
    use crate::kv::{FileStore, MemoryStore};
    use eyre::{Result, eyre};
    use tempfile::TempDir;

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(eyre!("storage disabled"))
        }

        fn set(&mut self, _key: &str, _value: &str) -> Result<()> {
            Err(eyre!("storage disabled"))
        }

        fn remove(&mut self, _key: &str) -> Result<()> {
            Err(eyre!("storage disabled"))
        }
    }

    fn sample() -> Vec<Todo> {
        vec![
            Todo {
                id: "b".to_string(),
                title: "Second".to_string(),
                completed: true,
                created_at: 2000.0,
            },
            Todo {
                id: "a".to_string(),
                title: "First".to_string(),
                completed: false,
                created_at: 1000.0,
            },
        ]
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let mut store = MemoryStore::new();
        let ids = IdGenerator::default();
        let clock = FixedClock::new(0);

        save_todos(Some(&mut store), DEFAULT_STORAGE_KEY, &sample());
        let loaded = load_todos(Some(&store), DEFAULT_STORAGE_KEY, &ids, &clock);
        assert_eq!(loaded, sample());
    }

    #[test]
    fn test_save_then_load_round_trip_on_disk() {
        let temp = TempDir::new().unwrap();
        let ids = IdGenerator::default();
        let clock = FixedClock::new(0);

        let mut store = FileStore::open(temp.path()).unwrap();
        save_todos(Some(&mut store), DEFAULT_STORAGE_KEY, &sample());

        let reopened = FileStore::open(temp.path()).unwrap();
        assert_eq!(load_todos(Some(&reopened), DEFAULT_STORAGE_KEY, &ids, &clock), sample());
    }

    #[test]
    fn test_load_without_store_is_empty() {
        let ids = IdGenerator::default();
        assert!(load_todos(None, DEFAULT_STORAGE_KEY, &ids, &FixedClock::new(0)).is_empty());
    }

    #[test]
    fn test_load_missing_or_blank_key_is_empty() {
        let mut store = MemoryStore::new();
        let ids = IdGenerator::default();
        let clock = FixedClock::new(0);

        assert!(load_todos(Some(&store), DEFAULT_STORAGE_KEY, &ids, &clock).is_empty());
        store.set(DEFAULT_STORAGE_KEY, "").unwrap();
        assert!(load_todos(Some(&store), DEFAULT_STORAGE_KEY, &ids, &clock).is_empty());
    }

    #[test]
    fn test_load_corrupt_value_is_empty() {
        let mut store = MemoryStore::new();
        let ids = IdGenerator::default();
        let clock = FixedClock::new(0);

        for corrupt in ["{not json", r#"{"title":"x"}"#, "\"string\"", "null"] {
            store.set(DEFAULT_STORAGE_KEY, corrupt).unwrap();
            assert!(load_todos(Some(&store), DEFAULT_STORAGE_KEY, &ids, &clock).is_empty());
        }
    }

    #[test]
    fn test_broken_store_is_swallowed() {
        let mut store = BrokenStore;
        let ids = IdGenerator::default();

        save_todos(Some(&mut store), DEFAULT_STORAGE_KEY, &sample());
        assert!(load_todos(Some(&store), DEFAULT_STORAGE_KEY, &ids, &FixedClock::new(0)).is_empty());
        save_todos::<MemoryStore>(None, DEFAULT_STORAGE_KEY, &sample());
    }

    #[test]
    fn test_quota_exceeded_keeps_previous_value() {
        let mut store = MemoryStore::with_quota(200);
        let ids = IdGenerator::default();
        let clock = FixedClock::new(0);

        save_todos(Some(&mut store), DEFAULT_STORAGE_KEY, &sample());

        let mut big = sample();
        big[0].title = "x".repeat(500);
        save_todos(Some(&mut store), DEFAULT_STORAGE_KEY, &big);

        assert_eq!(load_todos(Some(&store), DEFAULT_STORAGE_KEY, &ids, &clock), sample());
    }
}
