// Lenient decoding of stored to-do records

use crate::id::{Clock, IdGenerator};
use crate::models::Todo;
use eyre::{Result, eyre};
use serde_json::{Map, Value};

/// Decode a stored blob into a list of items.
///
/// Fails only when the blob is not JSON or not an array. Elements that are
/// not objects, or whose trimmed title is empty, are dropped.
pub fn decode_list(raw: &str, ids: &IdGenerator, clock: &dyn Clock) -> Result<Vec<Todo>> {
    let parsed: Value = serde_json::from_str(raw)?;
    let Value::Array(items) = parsed else {
        return Err(eyre!("Stored value is not an array"));
    };

    Ok(items
        .iter()
        .filter_map(|item| item.as_object())
        .map(|fields| decode_record(fields, ids, clock))
        .filter(|todo| !todo.title.is_empty())
        .collect())
}

/// Coerce one stored object into a `Todo`, filling defaults for missing or
/// mistyped fields
pub fn decode_record(fields: &Map<String, Value>, ids: &IdGenerator, clock: &dyn Clock) -> Todo {
    let title = match fields.get("title") {
        Some(Value::String(s)) => s.trim().to_string(),
        _ => String::new(),
    };

    let id = match fields.get("id") {
        Some(Value::String(s)) => s.clone(),
        _ => ids.next_id(clock),
    };

    let completed = fields.get("completed").is_some_and(truthy);

    let created_at = match fields.get("createdAt") {
        Some(Value::Number(n)) => n.as_f64(),
        _ => None,
    }
    .unwrap_or_else(|| clock.now_ms() as f64);

    Todo {
        id,
        title,
        completed,
        created_at,
    }
}

/// Loose truthiness: null, false, 0 and "" are false; everything else true
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
