// Data models for todo-atlas

use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// A single to-do item
///
/// Serialized with `createdAt` so the stored blob keeps the
/// `{id, title, completed, createdAt}` record shape.
///
/// `created_at` is milliseconds since epoch kept as a plain number, so a
/// stored fractional value survives a load/save cycle unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub id: String,
    pub title: String,
    pub completed: bool,
    #[serde(rename = "createdAt", with = "timestamp")]
    pub created_at: f64,
}

/// Whole timestamps are written as integers, anything else as a float
mod timestamp {
    use serde::{Deserialize, Deserializer, Serializer};

    const MAX_EXACT: f64 = 9_007_199_254_740_992.0; // 2^53

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.fract() == 0.0 && value.abs() <= MAX_EXACT {
            serializer.serialize_i64(*value as i64)
        } else {
            serializer.serialize_f64(*value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        f64::deserialize(deserializer)
    }
}

impl Todo {
    /// Copy of this item with `completed` inverted
    pub fn toggled(&self) -> Self {
        Self {
            completed: !self.completed,
            ..self.clone()
        }
    }

    /// Copy of this item carrying a new title
    pub fn retitled(&self, title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..self.clone()
        }
    }
}

/// Immutable view of the list at one point in time (most recent first)
pub type Snapshot = Rc<[Todo]>;

/// Derived counts over a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TodoStats {
    pub total: usize,
    pub remaining: usize,
    pub completed: usize,
    pub percent: u8,
}

impl TodoStats {
    pub fn from_todos(todos: &[Todo]) -> Self {
        let total = todos.len();
        let remaining = todos.iter().filter(|t| !t.completed).count();
        let completed = total - remaining;
        Self {
            total,
            remaining,
            completed,
            percent: completion_percent(completed, total),
        }
    }
}

/// Share of completed items, rounded half away from zero; 0 for an empty list
pub fn completion_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((completed as f64 / total as f64) * 100.0).round() as u8
}

/// Helper function to get current timestamp in milliseconds
pub fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
