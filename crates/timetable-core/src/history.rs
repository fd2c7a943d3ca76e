//! Journal of completed sync passes
//!
//! Kept as a JSON file next to the database rather than inside it, so the
//! schedule tables only ever change when the timetable does.

use crate::engine::SyncSummary;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// History file containing recent pass summaries, oldest first
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncHistory {
    pub entries: Vec<SyncSummary>,
}

impl SyncHistory {
    /// Create a new empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Load history from a file, or create empty if not exists
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save history to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Append a summary, dropping the oldest entries beyond `limit`
    pub fn record(&mut self, summary: SyncSummary, limit: usize) {
        self.entries.push(summary);
        if self.entries.len() > limit {
            let excess = self.entries.len() - limit;
            self.entries.drain(..excess);
        }
    }

    /// Most recent pass
    pub fn last(&self) -> Option<&SyncSummary> {
        self.entries.last()
    }

    /// Newest `n` entries, newest first
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &SyncSummary> {
        self.entries.iter().rev().take(n)
    }
}
