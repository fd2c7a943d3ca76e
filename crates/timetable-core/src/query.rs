//! Read-through cache for lesson queries
//!
//! The store stays the only source of truth. Every committed pass bumps the
//! generation and empties the cache; a load that raced with a commit is
//! returned to its caller but not cached.

use crate::error::Result;
use crate::model::{Lesson, WeekType};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Maximum cached query results before the cache is flushed
const MAX_CACHE_ENTRIES: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct QueryKey {
    group: String,
    week_day: Option<u8>,
    week_type: WeekType,
}

#[derive(Debug, Default)]
struct CacheState {
    generation: u64,
    entries: HashMap<QueryKey, Vec<Lesson>>,
}

#[derive(Debug, Default)]
pub struct LessonCache {
    state: Mutex<CacheState>,
}

impl LessonCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached result or run `load` and remember what it returns
    pub fn get_or_load<F>(
        &self,
        group: &str,
        week_day: Option<u8>,
        week_type: WeekType,
        load: F,
    ) -> Result<Vec<Lesson>>
    where
        F: FnOnce() -> Result<Vec<Lesson>>,
    {
        let key = QueryKey {
            group: group.to_string(),
            week_day,
            week_type,
        };

        let generation = {
            let state = self.state();
            if let Some(hit) = state.entries.get(&key) {
                return Ok(hit.clone());
            }
            state.generation
        };

        let lessons = load()?;

        let mut state = self.state();
        if state.generation == generation {
            if state.entries.len() >= MAX_CACHE_ENTRIES {
                state.entries.clear();
            }
            state.entries.insert(key, lessons.clone());
        }
        Ok(lessons)
    }

    /// Drop everything; called after each committed pass
    pub fn invalidate(&self) {
        let mut state = self.state();
        state.generation += 1;
        state.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
