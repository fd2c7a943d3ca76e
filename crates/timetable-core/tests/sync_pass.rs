//! End-to-end sync passes against file and HTTP sources

use std::cell::Cell;
use std::fs;
use std::path::Path;

use timetable_core::model::{GroupId, LessonId, LessonUpsert};
use timetable_core::{
    parse_grid_str, parse_schedule, reconcile, Error, ErrorKind, Group, GridOptions, Lesson,
    MetadataLayout, ScheduleStore, SourceLocator, Store, SyncEngine, WeekType,
};

const NO_SKIP: GridOptions = GridOptions { skip_rows: 0 };

const HEADER: &str = ",,,,,GroupA,GroupA.1,GroupB\n";
const PAIR_MATH: &str = ",Пн,I,чис.,09:00,Math,\n,,,,09:50,Smith,101\n";

fn file_engine(path: &Path) -> SyncEngine {
    SyncEngine::new(
        SourceLocator::Path(path.to_path_buf()),
        Store::open_in_memory().unwrap(),
    )
    .with_grid_options(NO_SKIP)
}

fn group_a_lessons(engine: &SyncEngine) -> Vec<Lesson> {
    engine
        .lessons_for_group("GroupA", None, WeekType::Numerator)
        .unwrap()
}

#[tokio::test]
async fn test_first_pass_creates_groups_and_lessons() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("timetable.csv");
    fs::write(&path, format!("{HEADER}{PAIR_MATH}")).unwrap();
    let engine = file_engine(&path);

    let summary = engine.run_sync_pass().await.unwrap();

    assert_eq!(summary.groups_seen, 2);
    assert_eq!(summary.lessons_parsed, 1);
    assert_eq!(summary.changes.groups_created, 2);
    assert_eq!(summary.changes.lessons_inserted, 1);

    let lessons = group_a_lessons(&engine);
    assert_eq!(lessons.len(), 1);
    let lesson = &lessons[0];
    assert_eq!(lesson.key.week_day, 1);
    assert_eq!(lesson.key.lesson_number, 1);
    assert_eq!(lesson.details.subject, "Math");
    assert_eq!(lesson.details.teacher.as_deref(), Some("Smith"));
    assert_eq!(lesson.details.room.as_deref(), Some("101"));
    assert_eq!(lesson.details.start_time.as_deref(), Some("09:00"));
    assert_eq!(lesson.details.end_time.as_deref(), Some("09:50"));

    let group_b = engine
        .lessons_for_group("GroupB", None, WeekType::Numerator)
        .unwrap();
    assert!(group_b.is_empty());
}

#[tokio::test]
async fn test_unchanged_source_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("timetable.csv");
    fs::write(&path, format!("{HEADER}{PAIR_MATH}")).unwrap();
    let engine = file_engine(&path);

    engine.run_sync_pass().await.unwrap();
    let groups_before = engine.groups().unwrap();
    let lessons_before = group_a_lessons(&engine);

    let second = engine.run_sync_pass().await.unwrap();

    assert!(second.is_noop());
    assert_eq!(second.changes.lessons_unchanged, 1);
    assert_eq!(engine.groups().unwrap(), groups_before);
    assert_eq!(group_a_lessons(&engine), lessons_before);
}

#[tokio::test]
async fn test_removed_group_column_deletes_group() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("timetable.csv");
    fs::write(
        &path,
        format!("{HEADER},Пн,I,чис.,09:00,Math,,Art\n,,,,09:50,Smith,101,Lee\n"),
    )
    .unwrap();
    let engine = file_engine(&path);
    engine.run_sync_pass().await.unwrap();
    let group_a: Group = engine.groups().unwrap().remove(0);
    let lessons_a = group_a_lessons(&engine);

    fs::write(
        &path,
        format!(",,,,,GroupA,GroupA.1\n{PAIR_MATH}"),
    )
    .unwrap();
    let summary = engine.run_sync_pass().await.unwrap();

    assert_eq!(summary.changes.groups_deleted, 1);
    assert_eq!(summary.changes.lessons_deleted, 1);
    assert_eq!(engine.groups().unwrap(), vec![group_a]);
    assert_eq!(group_a_lessons(&engine), lessons_a);

    let err = engine
        .lessons_for_group("GroupB", None, WeekType::Numerator)
        .unwrap_err();
    assert!(matches!(err, Error::GroupNotFound(_)));
}

#[tokio::test]
async fn test_subject_change_updates_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("timetable.csv");
    fs::write(&path, format!("{HEADER}{PAIR_MATH}")).unwrap();
    let engine = file_engine(&path);
    engine.run_sync_pass().await.unwrap();
    let original_id = group_a_lessons(&engine)[0].id;

    fs::write(
        &path,
        format!("{HEADER},Пн,I,чис.,09:00,Algebra,\n,,,,09:50,Smith,101\n"),
    )
    .unwrap();
    let summary = engine.run_sync_pass().await.unwrap();

    assert_eq!(summary.changes.lessons_updated, 1);
    assert_eq!(summary.changes.lessons_inserted, 0);
    assert_eq!(summary.changes.lessons_deleted, 0);
    let lessons = group_a_lessons(&engine);
    assert_eq!(lessons.len(), 1);
    assert_eq!(lessons[0].id, original_id);
    assert_eq!(lessons[0].details.subject, "Algebra");
}

#[tokio::test]
async fn test_unrecognised_weekday_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("timetable.csv");
    fs::write(
        &path,
        format!(
            "{HEADER},XX,I,чис.,09:00,Ghost,\n,,,,09:50,Nobody,\n,Вт,III,знам.,11:00,Chemistry,\n,,,,11:50,Brown,305\n"
        ),
    )
    .unwrap();
    let engine = file_engine(&path);

    let summary = engine.run_sync_pass().await.unwrap();

    assert_eq!(summary.skipped.unknown_weekday, 1);
    assert_eq!(summary.lessons_parsed, 1);
    let lessons = engine
        .lessons_for_group("GroupA", Some(2), WeekType::Denominator)
        .unwrap();
    assert_eq!(lessons.len(), 1);
    assert_eq!(lessons[0].key.lesson_number, 3);
    assert_eq!(lessons[0].details.room.as_deref(), Some("305"));
}

#[tokio::test]
async fn test_too_short_grid_aborts_pass() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("timetable.csv");
    fs::write(&path, format!("{HEADER}{PAIR_MATH}")).unwrap();
    let engine = file_engine(&path);
    engine.run_sync_pass().await.unwrap();

    fs::write(&path, HEADER).unwrap();
    let err = engine.run_sync_pass().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    assert_eq!(group_a_lessons(&engine).len(), 1);
}

#[tokio::test]
async fn test_non_timetable_page_leaves_store_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("timetable.csv");
    fs::write(&path, format!("{HEADER}{PAIR_MATH}")).unwrap();
    let engine = file_engine(&path);
    engine.run_sync_pass().await.unwrap();
    let groups_before = engine.groups().unwrap();
    let lessons_before = group_a_lessons(&engine);

    fs::write(
        &path,
        "<!DOCTYPE html>\n<html><head>\n<title>Sign in</title>\n</head></html>\n",
    )
    .unwrap();
    let err = engine.run_sync_pass().await.unwrap_err();

    assert!(matches!(err, Error::NoGroupColumns { .. }));
    assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    assert_eq!(engine.groups().unwrap(), groups_before);
    assert_eq!(group_a_lessons(&engine), lessons_before);
}

#[tokio::test]
async fn test_dropped_pair_deletes_only_that_lesson() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("timetable.csv");
    let art = ",Пн,II,чис.,10:00,Art,\n,,,,10:50,Lee,102\n";
    fs::write(&path, format!("{HEADER}{PAIR_MATH}{art}")).unwrap();
    let engine = file_engine(&path);
    engine.run_sync_pass().await.unwrap();
    let math = group_a_lessons(&engine).remove(0);
    assert_eq!(math.details.subject, "Math");

    fs::write(&path, format!("{HEADER}{PAIR_MATH}")).unwrap();
    let summary = engine.run_sync_pass().await.unwrap();

    assert_eq!(summary.changes.lessons_deleted, 1);
    assert_eq!(summary.changes.lessons_unchanged, 1);
    assert_eq!(summary.changes.groups_deleted, 0);
    assert_eq!(group_a_lessons(&engine), vec![math]);
}

/// Delegates to a real transaction but fails once its write budget runs out
struct FailingStore<'a, S> {
    inner: &'a S,
    writes_left: Cell<usize>,
}

impl<S: ScheduleStore> FailingStore<'_, S> {
    fn spend(&self) -> timetable_core::Result<()> {
        match self.writes_left.get() {
            0 => Err(Error::Config("injected storage failure".to_string())),
            n => {
                self.writes_left.set(n - 1);
                Ok(())
            }
        }
    }
}

impl<S: ScheduleStore> ScheduleStore for FailingStore<'_, S> {
    fn find_group_by_name(&self, name: &str) -> timetable_core::Result<Option<Group>> {
        self.inner.find_group_by_name(name)
    }

    fn create_group(&self, name: &str) -> timetable_core::Result<Group> {
        self.spend()?;
        self.inner.create_group(name)
    }

    fn delete_group(&self, id: GroupId) -> timetable_core::Result<()> {
        self.spend()?;
        self.inner.delete_group(id)
    }

    fn list_groups(&self) -> timetable_core::Result<Vec<Group>> {
        self.inner.list_groups()
    }

    fn list_lessons_by_group(&self, group_id: GroupId) -> timetable_core::Result<Vec<Lesson>> {
        self.inner.list_lessons_by_group(group_id)
    }

    fn upsert_lesson(&self, lesson: &LessonUpsert) -> timetable_core::Result<LessonId> {
        self.spend()?;
        self.inner.upsert_lesson(lesson)
    }

    fn delete_lesson(&self, id: LessonId) -> timetable_core::Result<()> {
        self.spend()?;
        self.inner.delete_lesson(id)
    }
}

fn snapshot_of(csv: &str) -> timetable_core::ParsedSchedule {
    let grid = parse_grid_str(csv, "test.csv", &NO_SKIP).unwrap();
    parse_schedule(&grid, &MetadataLayout::default(), "test.csv").unwrap()
}

fn dump(store: &Store) -> Vec<(Group, Vec<Lesson>)> {
    store
        .list_groups()
        .unwrap()
        .into_iter()
        .map(|g| {
            let lessons = store.list_lessons_by_group(g.id).unwrap();
            (g, lessons)
        })
        .collect()
}

#[test]
fn test_failure_mid_pass_leaves_prior_state() {
    let mut store = Store::open_in_memory().unwrap();
    let before = snapshot_of(&format!(
        "{HEADER},Пн,I,чис.,09:00,Math,,Art\n,,,,09:50,Smith,101,Lee\n"
    ));
    store.transaction(|tx| reconcile(tx, &before)).unwrap();
    let state_before = dump(&store);

    // Drops GroupB, renames a subject and adds GroupC; the third write fails
    let after = snapshot_of(&format!(
        ",,,,,GroupA,GroupA.1,GroupC\n,Пн,I,чис.,09:00,Algebra,,Music\n,,,,09:50,Smith,101,Kay\n"
    ));
    let result = store.transaction(|tx| {
        let failing = FailingStore {
            inner: tx,
            writes_left: Cell::new(2),
        };
        reconcile(&failing, &after)
    });

    assert!(result.is_err());
    assert_eq!(dump(&store), state_before);
}

const SCENARIO: &str = ",,,,,GroupA,GroupA.1,GroupB\n,Пн,I,чис.,09:00,Math,\n,,,,09:50,Smith,101\n";

#[tokio::test]
async fn test_pass_over_http() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/pub")
        .with_status(200)
        .with_header("content-type", "text/csv; charset=utf-8")
        .with_body(format!("Розклад занять,,,,,,,\n{SCENARIO}"))
        .create_async()
        .await;

    // Default options drop the banner line above the header
    let engine = SyncEngine::new(
        SourceLocator::Url(format!("{}/pub", server.url())),
        Store::open_in_memory().unwrap(),
    );
    let summary = engine.run_sync_pass().await.unwrap();

    mock.assert_async().await;
    assert_eq!(summary.groups_seen, 2);
    assert_eq!(group_a_lessons(&engine)[0].details.subject, "Math");
}

#[tokio::test]
async fn test_http_error_is_source_unavailable() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/pub")
        .with_status(404)
        .create_async()
        .await;

    let engine = SyncEngine::new(
        SourceLocator::Url(format!("{}/pub", server.url())),
        Store::open_in_memory().unwrap(),
    );
    let err = engine.run_sync_pass().await.unwrap_err();

    assert!(matches!(err, Error::Fetch { .. }));
    assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    assert!(engine.groups().unwrap().is_empty());
}
