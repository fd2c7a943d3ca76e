//! One sync pass: fetch, parse, reconcile, commit

use crate::config::{MetadataLayout, TimetableConfig};
use crate::error::{Error, Result};
use crate::extractor::{parse_schedule, ParsedSchedule, SkipCounts};
use crate::loader::{self, GridOptions, SourceLocator};
use crate::model::{Group, Lesson, WeekType};
use crate::query::LessonCache;
use crate::reconciler::{reconcile, ReconcileStats};
use crate::store::Store;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;

/// Outcome of a committed pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub source: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub groups_seen: usize,
    pub lessons_parsed: usize,
    pub changes: ReconcileStats,
    pub skipped: SkipCounts,
}

impl SyncSummary {
    /// True when the pass left the store exactly as it found it
    pub fn is_noop(&self) -> bool {
        self.changes.is_noop()
    }

    pub fn elapsed_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// Single-flight driver of sync passes over one source and one store.
///
/// Also serves lesson queries through a cache that each commit invalidates.
pub struct SyncEngine {
    source: SourceLocator,
    grid_options: GridOptions,
    layout: MetadataLayout,
    store: Mutex<Store>,
    run_lock: tokio::sync::Mutex<()>,
    cache: LessonCache,
}

impl SyncEngine {
    pub fn new(source: SourceLocator, store: Store) -> Self {
        Self {
            source,
            grid_options: GridOptions::default(),
            layout: MetadataLayout::default(),
            store: Mutex::new(store),
            run_lock: tokio::sync::Mutex::new(()),
            cache: LessonCache::new(),
        }
    }

    /// Build an engine from loaded configuration, opening the database file
    pub fn from_config(config: &TimetableConfig) -> Result<Self> {
        let source = config.source.locator()?;
        let store = Store::open(&config.database.path)?;
        Ok(Self::new(source, store)
            .with_grid_options(config.source.grid_options())
            .with_layout(config.layout))
    }

    pub fn with_grid_options(mut self, options: GridOptions) -> Self {
        self.grid_options = options;
        self
    }

    pub fn with_layout(mut self, layout: MetadataLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn source(&self) -> &SourceLocator {
        &self.source
    }

    /// Run one complete pass.
    ///
    /// Fails fast with [`Error::PassInFlight`] if another pass holds the run
    /// lock. Source and storage errors abort the pass with the store untouched;
    /// retrying is left to whoever schedules passes.
    pub async fn run_sync_pass(&self) -> Result<SyncSummary> {
        let _running = self.run_lock.try_lock().map_err(|_| Error::PassInFlight)?;
        let started_at = Utc::now();
        info!(source = %self.source, "sync pass started");

        let grid = loader::fetch(&self.source, &self.grid_options).await?;
        let parsed = parse_schedule(&grid, &self.layout, &self.source.to_string())?;
        let changes = self.commit(&parsed)?;

        let summary = SyncSummary {
            source: self.source.to_string(),
            started_at,
            finished_at: Utc::now(),
            groups_seen: parsed.groups.len(),
            lessons_parsed: parsed.lesson_count(),
            changes,
            skipped: parsed.skipped,
        };

        info!(
            groups = summary.groups_seen,
            lessons = summary.lessons_parsed,
            groups_created = changes.groups_created,
            groups_deleted = changes.groups_deleted,
            inserted = changes.lessons_inserted,
            updated = changes.lessons_updated,
            deleted = changes.lessons_deleted,
            skipped = summary.skipped.total(),
            elapsed_ms = summary.elapsed_ms(),
            "sync pass committed"
        );
        Ok(summary)
    }

    /// Reconcile an already-parsed snapshot in one transaction
    pub fn commit(&self, parsed: &ParsedSchedule) -> Result<ReconcileStats> {
        let stats = self.store().transaction(|tx| reconcile(tx, parsed))?;
        self.cache.invalidate();
        Ok(stats)
    }

    /// Lessons of a group for a week type, optionally for one weekday.
    ///
    /// Reflects the last committed pass.
    pub fn lessons_for_group(
        &self,
        group_name: &str,
        week_day: Option<u8>,
        week_type: WeekType,
    ) -> Result<Vec<Lesson>> {
        self.cache.get_or_load(group_name, week_day, week_type, || {
            self.store()
                .lessons_for_group(group_name, week_day, week_type)
        })
    }

    /// All persisted groups, by name
    pub fn groups(&self) -> Result<Vec<Group>> {
        self.store().list_groups()
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
