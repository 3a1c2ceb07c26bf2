// todo-atlas - Reactive to-do list and visibility state with key-value persistence

pub mod config;
pub mod filter;
pub mod id;
pub mod kv;
pub mod logging;
pub mod models;
pub mod observable;
pub mod persist;
pub mod record;
pub mod todos;
pub mod visibility;

// Re-export main types for convenience
pub use config::Config;
pub use filter::Filter;
pub use id::{Clock, FixedClock, IdGenerator, IdStrategy, SystemClock};
pub use kv::{Backend, FileStore, KeyValueStore, MemoryStore, SqliteStore, open_backend};
pub use models::{Snapshot, Todo, TodoStats, now_ms};
pub use observable::{Observable, Subscription};
pub use persist::DEFAULT_STORAGE_KEY;
pub use todos::{TodoListBuilder, TodoListState};
pub use visibility::VisibilityState;
