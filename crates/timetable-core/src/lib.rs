//! timetable-core: Core library for syncing a published timetable into SQLite
//!
//! This library provides functionality to:
//! - Fetch a published timetable sheet (CSV over HTTP or from disk)
//! - Classify header columns into groups and their room columns
//! - Decode row pairs into lesson records
//! - Reconcile parsed lessons against the stored schedule in one transaction
//! - Serve lesson queries from the last committed pass

pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod grid;
pub mod history;
pub mod loader;
pub mod model;
pub mod query;
pub mod reconciler;
pub mod store;
pub mod tokens;

pub use classifier::{classify, Classification, GroupColumn};
pub use config::{MetadataLayout, TimetableConfig};
pub use engine::{SyncEngine, SyncSummary};
pub use error::{Error, ErrorKind, Result};
pub use extractor::{extract_lessons, parse_schedule, GroupExtraction, ParsedSchedule, SkipCounts};
pub use grid::RawGrid;
pub use history::SyncHistory;
pub use loader::{fetch, parse_grid_str, GridOptions, SourceLocator};
pub use model::{Group, Lesson, LessonDetails, LessonKey, LessonRecord, WeekType};
pub use reconciler::{diff_lessons, reconcile, LessonDiff, ReconcileStats};
pub use store::{ScheduleStore, Store, StoreTx};
