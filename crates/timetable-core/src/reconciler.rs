//! Three-way reconciliation of a parsed snapshot against the store

use crate::error::Result;
use crate::extractor::ParsedSchedule;
use crate::model::{Group, Lesson, LessonId, LessonKey, LessonRecord, LessonUpsert};
use crate::store::ScheduleStore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info};

/// What has to change for one group's lessons to match the snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LessonDiff<'a> {
    /// Keys only in the snapshot
    pub inserts: Vec<&'a LessonRecord>,
    /// Keys in both whose details differ, with the persisted id to keep
    pub updates: Vec<(LessonId, &'a LessonRecord)>,
    /// Persisted lessons whose key vanished from the snapshot
    pub deletes: Vec<LessonId>,
    pub unchanged: usize,
}

impl LessonDiff<'_> {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }
}

/// Counts of the writes a reconciliation performed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileStats {
    pub groups_created: usize,
    pub groups_deleted: usize,
    pub groups_kept: usize,
    pub lessons_inserted: usize,
    pub lessons_updated: usize,
    pub lessons_deleted: usize,
    pub lessons_unchanged: usize,
}

impl ReconcileStats {
    /// True when nothing was written
    pub fn is_noop(&self) -> bool {
        self.groups_created == 0
            && self.groups_deleted == 0
            && self.lessons_inserted == 0
            && self.lessons_updated == 0
            && self.lessons_deleted == 0
    }
}

/// Diff parsed records against persisted lessons by identity key.
///
/// Pure; nothing is written. Output is ordered by key.
pub fn diff_lessons<'a>(parsed: &'a [LessonRecord], persisted: &[Lesson]) -> LessonDiff<'a> {
    // BTreeMap for deterministic ordering
    let current: BTreeMap<LessonKey, &LessonRecord> = parsed.iter().map(|r| (r.key, r)).collect();
    let stored: BTreeMap<LessonKey, &Lesson> = persisted.iter().map(|l| (l.key, l)).collect();

    let mut diff = LessonDiff::default();

    for (key, lesson) in &stored {
        if !current.contains_key(key) {
            diff.deletes.push(lesson.id);
        }
    }

    for (key, record) in current {
        match stored.get(&key) {
            Some(lesson) if lesson.details == record.details => diff.unchanged += 1,
            Some(lesson) => diff.updates.push((lesson.id, record)),
            None => diff.inserts.push(record),
        }
    }

    diff
}

/// Bring the store into exact correspondence with `parsed`.
///
/// Groups missing from the snapshot lose their lessons and are then removed;
/// new groups are created; surviving groups keep their ids. Run this inside a
/// single transaction so a failure leaves the previous state intact.
pub fn reconcile<S: ScheduleStore + ?Sized>(store: &S, parsed: &ParsedSchedule) -> Result<ReconcileStats> {
    let mut stats = ReconcileStats::default();
    let snapshot: HashSet<&str> = parsed.group_names().into_iter().collect();

    let mut existing: HashMap<String, Group> = HashMap::new();
    for group in store.list_groups()? {
        if snapshot.contains(group.name.as_str()) {
            existing.insert(group.name.clone(), group);
        } else {
            remove_group(store, &group, &mut stats)?;
        }
    }

    for extraction in &parsed.groups {
        let group = match existing.remove(&extraction.group) {
            Some(group) => {
                stats.groups_kept += 1;
                group
            }
            None => {
                let group = store.create_group(&extraction.group)?;
                info!(group = %group.name, id = group.id, "group created");
                stats.groups_created += 1;
                group
            }
        };
        reconcile_group(store, &group, &extraction.lessons, &mut stats)?;
    }

    Ok(stats)
}

/// Apply the lesson diff for one group
pub fn reconcile_group<S: ScheduleStore + ?Sized>(
    store: &S,
    group: &Group,
    lessons: &[LessonRecord],
    stats: &mut ReconcileStats,
) -> Result<()> {
    let persisted = store.list_lessons_by_group(group.id)?;
    let diff = diff_lessons(lessons, &persisted);

    for id in &diff.deletes {
        store.delete_lesson(*id)?;
    }
    for (id, record) in &diff.updates {
        store.upsert_lesson(&LessonUpsert {
            id: Some(*id),
            group_id: group.id,
            key: record.key,
            details: record.details.clone(),
        })?;
    }
    for record in &diff.inserts {
        store.upsert_lesson(&LessonUpsert {
            id: None,
            group_id: group.id,
            key: record.key,
            details: record.details.clone(),
        })?;
    }

    if !diff.is_empty() {
        debug!(
            group = %group.name,
            inserted = diff.inserts.len(),
            updated = diff.updates.len(),
            deleted = diff.deletes.len(),
            "group lessons reconciled"
        );
    }

    stats.lessons_inserted += diff.inserts.len();
    stats.lessons_updated += diff.updates.len();
    stats.lessons_deleted += diff.deletes.len();
    stats.lessons_unchanged += diff.unchanged;
    Ok(())
}

/// Delete a group's lessons, then the group itself
fn remove_group<S: ScheduleStore + ?Sized>(
    store: &S,
    group: &Group,
    stats: &mut ReconcileStats,
) -> Result<()> {
    let lessons = store.list_lessons_by_group(group.id)?;
    for lesson in &lessons {
        store.delete_lesson(lesson.id)?;
    }
    store.delete_group(group.id)?;

    info!(group = %group.name, lessons = lessons.len(), "group removed");
    stats.groups_deleted += 1;
    stats.lessons_deleted += lessons.len();
    Ok(())
}
