// To-do list state: an ordered list plus a filter selection

use crate::filter::Filter;
use crate::id::{Clock, IdGenerator, SystemClock};
use crate::kv::KeyValueStore;
use crate::models::{Snapshot, Todo, TodoStats, completion_percent};
use crate::observable::{Observable, Subscription};
use crate::persist::{self, DEFAULT_STORAGE_KEY};
use std::rc::Rc;
use tracing::debug;

/// Reactive to-do list with automatic persistence
///
/// The list is an immutable [`Snapshot`]. A change installs a fresh one,
/// notifies subscribers and then persists it. Mutators whose input matches
/// nothing keep the current snapshot and skip the write, so `Rc::ptr_eq` on
/// two snapshots tells whether anything changed. Derived views are
/// recomputed from the current snapshot on each call.
pub struct TodoListState {
    todos: Observable<Snapshot>,
    filter: Observable<Filter>,
    store: Option<Box<dyn KeyValueStore>>,
    key: String,
    ids: IdGenerator,
    clock: Box<dyn Clock>,
}

impl std::fmt::Debug for TodoListState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TodoListState")
            .field("todos", &self.todos)
            .field("filter", &self.filter)
            .field("key", &self.key)
            .field("has_store", &self.store.is_some())
            .finish()
    }
}

/// Construction options for [`TodoListState`]
pub struct TodoListBuilder {
    store: Option<Box<dyn KeyValueStore>>,
    key: String,
    ids: IdGenerator,
    clock: Box<dyn Clock>,
}

impl Default for TodoListBuilder {
    fn default() -> Self {
        Self {
            store: None,
            key: DEFAULT_STORAGE_KEY.to_string(),
            ids: IdGenerator::default(),
            clock: Box::new(SystemClock),
        }
    }
}

impl TodoListBuilder {
    pub fn store(mut self, store: impl KeyValueStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    /// Use `store` when present; `None` means storage is unavailable
    pub fn maybe_store(mut self, store: Option<Box<dyn KeyValueStore>>) -> Self {
        self.store = store;
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn ids(mut self, ids: IdGenerator) -> Self {
        self.ids = ids;
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Load the stored list and build the state
    pub fn build(self) -> TodoListState {
        let loaded = persist::load_todos(self.store.as_deref(), &self.key, &self.ids, self.clock.as_ref());
        debug!(key = %self.key, count = loaded.len(), "TodoListState: initialized");

        TodoListState {
            todos: Observable::new(Snapshot::from(loaded)),
            filter: Observable::new(Filter::default()),
            store: self.store,
            key: self.key,
            ids: self.ids,
            clock: self.clock,
        }
    }
}

impl TodoListState {
    pub fn builder() -> TodoListBuilder {
        TodoListBuilder::default()
    }

    /// State backed by `store` under the default key
    pub fn open(store: impl KeyValueStore + 'static) -> Self {
        Self::builder().store(store).build()
    }

    /// State with no storage; starts empty and never persists
    pub fn in_memory() -> Self {
        Self::builder().build()
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Current snapshot, most recent first
    pub fn todos(&self) -> Snapshot {
        self.todos.get()
    }

    pub fn get(&self, id: &str) -> Option<Todo> {
        self.todos.with(|todos| todos.iter().find(|t| t.id == id).cloned())
    }

    pub fn filter(&self) -> Filter {
        self.filter.get()
    }

    /// Number of list changes since construction
    pub fn version(&self) -> u64 {
        self.todos.version()
    }

    pub fn storage_key(&self) -> &str {
        &self.key
    }

    pub fn total_count(&self) -> usize {
        self.todos.with(|todos| todos.len())
    }

    pub fn remaining_count(&self) -> usize {
        self.todos.with(|todos| todos.iter().filter(|t| !t.completed).count())
    }

    pub fn completed_count(&self) -> usize {
        self.total_count() - self.remaining_count()
    }

    pub fn completion_percent(&self) -> u8 {
        completion_percent(self.completed_count(), self.total_count())
    }

    pub fn stats(&self) -> TodoStats {
        self.todos.with(|todos| TodoStats::from_todos(todos))
    }

    /// Items matching the current filter, original order preserved
    pub fn filtered_todos(&self) -> Vec<Todo> {
        let filter = self.filter();
        self.todos.with(|todos| filter.apply(todos))
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    pub fn subscribe_todos(&self, callback: impl Fn(&Snapshot) + 'static) -> Subscription {
        self.todos.subscribe(callback)
    }

    pub fn subscribe_filter(&self, callback: impl Fn(Filter) + 'static) -> Subscription {
        self.filter.subscribe(move |filter| callback(*filter))
    }

    // ========================================================================
    // Mutators
    // ========================================================================

    /// Prepend a new item. Blank titles are ignored.
    ///
    /// Returns the new item's id.
    pub fn add_todo(&mut self, title: &str) -> Option<String> {
        let title = title.trim();
        if title.is_empty() {
            return None;
        }

        let todo = Todo {
            id: self.ids.next_id(self.clock.as_ref()),
            title: title.to_string(),
            completed: false,
            created_at: self.clock.now_ms() as f64,
        };
        let id = todo.id.clone();

        let next: Snapshot = std::iter::once(todo)
            .chain(self.todos.with(|todos| todos.to_vec()))
            .collect();
        self.commit(next);
        Some(id)
    }

    /// Flip `completed` on the matching item; unknown ids are ignored
    pub fn toggle_todo(&mut self, id: &str) {
        self.replace_where(id, Todo::toggled);
    }

    /// Retitle the matching item; blank titles and unknown ids are ignored
    pub fn rename_todo(&mut self, id: &str, title: &str) {
        let title = title.trim();
        if title.is_empty() {
            return;
        }
        self.replace_where(id, |todo| todo.retitled(title));
    }

    pub fn remove_todo(&mut self, id: &str) {
        self.retain(|todo| todo.id != id);
    }

    pub fn clear_completed(&mut self) {
        self.retain(|todo| !todo.completed);
    }

    pub fn set_filter(&mut self, next: Filter) {
        self.filter.set(next);
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn replace_where(&mut self, id: &str, f: impl Fn(&Todo) -> Todo) {
        let current = self.todos();
        if !current.iter().any(|t| t.id == id) {
            return;
        }
        let next: Snapshot = current
            .iter()
            .map(|t| if t.id == id { f(t) } else { t.clone() })
            .collect();
        self.commit(next);
    }

    fn retain(&mut self, keep: impl Fn(&Todo) -> bool) {
        let current = self.todos();
        if current.iter().all(&keep) {
            return;
        }
        let next: Snapshot = current.iter().filter(|&t| keep(t)).cloned().collect();
        self.commit(next);
    }

    /// Install a new snapshot, then persist it
    fn commit(&mut self, next: Snapshot) {
        self.todos.set(Rc::clone(&next));
        persist::save_todos(self.store.as_deref_mut(), &self.key, &next);
    }
}
