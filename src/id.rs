// Identifier generation and time source

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::rc::Rc;
use uuid::Uuid;

/// Source of "now" in milliseconds since epoch
pub trait Clock {
    fn now_ms(&self) -> i64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        crate::models::now_ms()
    }
}

/// Manually driven clock; clones share the same time
#[derive(Debug, Clone, Default)]
pub struct FixedClock {
    now: Rc<Cell<i64>>,
}

impl FixedClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: Rc::new(Cell::new(now)),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.set(now);
    }

    pub fn advance(&self, ms: i64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.now.get()
    }
}

/// How new identifiers are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
    /// Random v4 UUID
    #[default]
    Uuid,
    /// `todo-{now_ms}-{hex}`
    Timestamp,
}

/// Produces ids unique for the lifetime of the process
#[derive(Debug)]
pub struct IdGenerator {
    strategy: IdStrategy,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(IdStrategy::default())
    }
}

impl IdGenerator {
    pub fn new(strategy: IdStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> IdStrategy {
        self.strategy
    }

    pub fn next_id(&self, clock: &dyn Clock) -> String {
        match self.strategy {
            IdStrategy::Uuid => Uuid::new_v4().to_string(),
            IdStrategy::Timestamp => {
                let suffix: u64 = rand::thread_rng().r#gen();
                format!("todo-{}-{:x}", clock.now_ms(), suffix)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_uuid_ids_are_unique() {
        let ids = IdGenerator::default();
        let clock = SystemClock;
        let minted: HashSet<String> = (0..500).map(|_| ids.next_id(&clock)).collect();
        assert_eq!(minted.len(), 500);
        assert!(minted.iter().all(|id| Uuid::parse_str(id).is_ok()));
    }

    #[test]
    fn test_timestamp_ids_unique_within_same_millisecond() {
        let ids = IdGenerator::new(IdStrategy::Timestamp);
        let clock = FixedClock::new(1_700_000_000_000);
        let minted: HashSet<String> = (0..500).map(|_| ids.next_id(&clock)).collect();
        assert_eq!(minted.len(), 500);
        assert!(minted.iter().all(|id| id.starts_with("todo-1700000000000-")));
    }

    #[test]
    fn test_timestamp_id_suffix_is_hex_u64() {
        let ids = IdGenerator::new(IdStrategy::Timestamp);
        let id = ids.next_id(&FixedClock::new(7));
        let suffix = id.strip_prefix("todo-7-").unwrap();
        assert!(u64::from_str_radix(suffix, 16).is_ok());
    }

    #[test]
    fn test_fixed_clock_is_shared_between_clones() {
        let clock = FixedClock::new(5);
        let other = clock.clone();
        clock.advance(10);
        assert_eq!(other.now_ms(), 15);
        other.set(1);
        assert_eq!(clock.now_ms(), 1);
    }

    #[test]
    fn test_id_strategy_serde() {
        assert_eq!(serde_json::to_string(&IdStrategy::Timestamp).unwrap(), "\"timestamp\"");
        let parsed: IdStrategy = serde_json::from_str("\"uuid\"").unwrap();
        assert_eq!(parsed, IdStrategy::Uuid);
    }
}
