use std::collections::HashMap;
use std::marker::PhantomData;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::models::{DailyLogEntry, Goals, ManualGroceryItem, Meal, WeeklyPlan};

/// String-keyed storage of serialized values. No cross-key transactions.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    /// Returns whether a value was present.
    fn remove(&mut self, key: &str) -> Result<bool>;
}

/// A store key bound to the type stored under it.
pub struct StoreKey<T> {
    name: &'static str,
    _value: PhantomData<fn() -> T>,
}

impl<T> StoreKey<T> {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _value: PhantomData,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

pub const GOALS: StoreKey<Goals> = StoreKey::new("nutritrack-goals");
pub const MEALS: StoreKey<Vec<Meal>> = StoreKey::new("nutritrack-meals");
pub const DAILY_LOG: StoreKey<Vec<DailyLogEntry>> = StoreKey::new("nutritrack-dailyLog");
pub const WEEKLY_PLAN: StoreKey<WeeklyPlan> = StoreKey::new("nutritrack-weeklyPlan");
pub const MANUAL_LIST: StoreKey<Vec<ManualGroceryItem>> = StoreKey::new("nutritrack-manualList");

/// Read a typed value, falling back to its default when the key is absent or
/// the stored text no longer deserializes.
pub fn load<S, T>(store: &S, key: &StoreKey<T>) -> Result<T>
where
    S: KeyValueStore + ?Sized,
    T: DeserializeOwned + Default,
{
    let Some(raw) = store.get(key.name())? else {
        return Ok(T::default());
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(value),
        Err(e) => {
            warn!(key = key.name(), error = %e, "stored value is unreadable, using default");
            Ok(T::default())
        }
    }
}

pub fn save<S, T>(store: &mut S, key: &StoreKey<T>, value: &T) -> Result<()>
where
    S: KeyValueStore + ?Sized,
    T: Serialize,
{
    let raw = serde_json::to_string(value)
        .with_context(|| format!("Failed to serialize {}", key.name()))?;
    store.set(key.name(), &raw)
}

/// Non-persistent store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_key_returns_default() {
        let store = MemoryStore::new();
        let goals = load(&store, &GOALS).unwrap();
        assert_eq!(goals, Goals::default());
        let meals = load(&store, &MEALS).unwrap();
        assert!(meals.is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let mut store = MemoryStore::new();
        let goals = Goals {
            calories: 2000.0,
            protein: 150.0,
            carbs: 200.0,
            fat: 70.0,
        };
        save(&mut store, &GOALS, &goals).unwrap();
        assert_eq!(load(&store, &GOALS).unwrap(), goals);
    }

    #[test]
    fn test_corrupt_value_falls_back_to_default() {
        let mut store = MemoryStore::new();
        store.set(MEALS.name(), "{not json").unwrap();
        let meals = load(&store, &MEALS).unwrap();
        assert!(meals.is_empty());
    }

    #[test]
    fn test_keys_use_expected_names() {
        assert_eq!(GOALS.name(), "nutritrack-goals");
        assert_eq!(MEALS.name(), "nutritrack-meals");
        assert_eq!(DAILY_LOG.name(), "nutritrack-dailyLog");
        assert_eq!(WEEKLY_PLAN.name(), "nutritrack-weeklyPlan");
        assert_eq!(MANUAL_LIST.name(), "nutritrack-manualList");
    }

    #[test]
    fn test_memory_store_remove() {
        let mut store = MemoryStore::new();
        store.set("k", "v").unwrap();
        assert!(store.remove("k").unwrap());
        assert!(!store.remove("k").unwrap());
        assert!(store.get("k").unwrap().is_none());
    }
}
