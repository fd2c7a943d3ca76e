//! SQLite persistence for groups and lessons
//!
//! The reconciler only talks to [`ScheduleStore`]; [`Store::transaction`]
//! hands it a [`StoreTx`] so a whole pass commits or rolls back as one unit.

use crate::error::{Error, Result};
use crate::model::{Group, GroupId, Lesson, LessonDetails, LessonId, LessonKey, LessonUpsert, WeekType};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;
use tracing::info;

const LESSON_COLUMNS: &str = "l.id, l.group_id, l.week_day, l.lesson_number, l.week_type,
     l.subject, l.teacher, l.room, l.start_time, l.end_time";

/// Operations the reconciler needs from persistence
pub trait ScheduleStore {
    fn find_group_by_name(&self, name: &str) -> Result<Option<Group>>;
    fn create_group(&self, name: &str) -> Result<Group>;
    /// Delete a group row. Its lessons must already be gone.
    fn delete_group(&self, id: GroupId) -> Result<()>;
    fn list_groups(&self) -> Result<Vec<Group>>;
    fn list_lessons_by_group(&self, group_id: GroupId) -> Result<Vec<Lesson>>;
    /// Insert when `lesson.id` is `None`, otherwise update that row in place
    fn upsert_lesson(&self, lesson: &LessonUpsert) -> Result<LessonId>;
    fn delete_lesson(&self, id: LessonId) -> Result<()>;
}

/// Initialise the schedule schema. Safe to call on every startup.
///
/// `lessons.group_id` has no `ON DELETE CASCADE`: with foreign keys enforced,
/// deleting a group that still owns lessons fails.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS groups (
            id      INTEGER PRIMARY KEY AUTOINCREMENT,
            name    TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS lessons (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            group_id        INTEGER NOT NULL REFERENCES groups(id),
            week_day        INTEGER NOT NULL CHECK (week_day BETWEEN 1 AND 7),
            lesson_number   INTEGER NOT NULL CHECK (lesson_number BETWEEN 1 AND 10),
            week_type       TEXT    NOT NULL CHECK (week_type IN ('numerator', 'denominator')),
            subject         TEXT    NOT NULL,
            teacher         TEXT,
            room            TEXT,
            start_time      TEXT,
            end_time        TEXT,
            UNIQUE (group_id, week_day, lesson_number, week_type)
        );",
    )
}

/// Owner of the SQLite connection
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) a database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening schedule database");
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::from_connection(conn)
    }

    /// Fresh private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        init_db(&conn)?;
        Ok(Self { conn })
    }

    /// Run `f` inside one transaction; commit on `Ok`, roll back on `Err`
    pub fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&StoreTx<'_>) -> Result<T>,
    {
        let tx = StoreTx {
            tx: self.conn.transaction()?,
        };
        let value = f(&tx)?;
        tx.tx.commit()?;
        Ok(value)
    }

    pub fn list_groups(&self) -> Result<Vec<Group>> {
        list_groups(&self.conn)
    }

    pub fn find_group_by_name(&self, name: &str) -> Result<Option<Group>> {
        find_group_by_name(&self.conn, name)
    }

    pub fn list_lessons_by_group(&self, group_id: GroupId) -> Result<Vec<Lesson>> {
        list_lessons_by_group(&self.conn, group_id)
    }

    /// Lessons of a group for one week type, optionally narrowed to a weekday,
    /// ordered by weekday then lesson number
    pub fn lessons_for_group(
        &self,
        group_name: &str,
        week_day: Option<u8>,
        week_type: WeekType,
    ) -> Result<Vec<Lesson>> {
        let group = find_group_by_name(&self.conn, group_name)?
            .ok_or_else(|| Error::GroupNotFound(group_name.to_string()))?;

        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {LESSON_COLUMNS} FROM lessons l
             WHERE l.group_id = ?1 AND l.week_type = ?2
               AND (?3 IS NULL OR l.week_day = ?3)
             ORDER BY l.week_day, l.lesson_number"
        ))?;
        let lessons = stmt
            .query_map(params![group.id, week_type, week_day], lesson_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(lessons)
    }
}

/// Store operations bound to an open transaction
pub struct StoreTx<'conn> {
    tx: Transaction<'conn>,
}

impl ScheduleStore for StoreTx<'_> {
    fn find_group_by_name(&self, name: &str) -> Result<Option<Group>> {
        find_group_by_name(&self.tx, name)
    }

    fn create_group(&self, name: &str) -> Result<Group> {
        self.tx
            .execute("INSERT INTO groups (name) VALUES (?1)", [name])?;
        Ok(Group {
            id: self.tx.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    fn delete_group(&self, id: GroupId) -> Result<()> {
        self.tx.execute("DELETE FROM groups WHERE id = ?1", [id])?;
        Ok(())
    }

    fn list_groups(&self) -> Result<Vec<Group>> {
        list_groups(&self.tx)
    }

    fn list_lessons_by_group(&self, group_id: GroupId) -> Result<Vec<Lesson>> {
        list_lessons_by_group(&self.tx, group_id)
    }

    fn upsert_lesson(&self, lesson: &LessonUpsert) -> Result<LessonId> {
        let LessonUpsert {
            id,
            group_id,
            key,
            details,
        } = lesson;

        match id {
            Some(id) => {
                let n = self.tx.execute(
                    "UPDATE lessons SET subject = ?1, teacher = ?2, room = ?3,
                         start_time = ?4, end_time = ?5
                     WHERE id = ?6 AND group_id = ?7",
                    params![
                        details.subject,
                        details.teacher,
                        details.room,
                        details.start_time,
                        details.end_time,
                        id,
                        group_id
                    ],
                )?;
                if n == 0 {
                    return Err(Error::Storage(rusqlite::Error::QueryReturnedNoRows));
                }
                Ok(*id)
            }
            None => {
                self.tx.execute(
                    "INSERT INTO lessons
                     (group_id, week_day, lesson_number, week_type,
                      subject, teacher, room, start_time, end_time)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        group_id,
                        key.week_day,
                        key.lesson_number,
                        key.week_type,
                        details.subject,
                        details.teacher,
                        details.room,
                        details.start_time,
                        details.end_time
                    ],
                )?;
                Ok(self.tx.last_insert_rowid())
            }
        }
    }

    fn delete_lesson(&self, id: LessonId) -> Result<()> {
        self.tx.execute("DELETE FROM lessons WHERE id = ?1", [id])?;
        Ok(())
    }
}

// --- shared queries ---------------------------------------------------------

fn find_group_by_name(conn: &Connection, name: &str) -> Result<Option<Group>> {
    let group = conn
        .query_row(
            "SELECT id, name FROM groups WHERE name = ?1",
            [name],
            |row| {
                Ok(Group {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(group)
}

fn list_groups(conn: &Connection) -> Result<Vec<Group>> {
    let mut stmt = conn.prepare_cached("SELECT id, name FROM groups ORDER BY name")?;
    let groups = stmt
        .query_map([], |row| {
            Ok(Group {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(groups)
}

fn list_lessons_by_group(conn: &Connection, group_id: GroupId) -> Result<Vec<Lesson>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {LESSON_COLUMNS} FROM lessons l WHERE l.group_id = ?1
         ORDER BY l.week_day, l.lesson_number, l.week_type"
    ))?;
    let lessons = stmt
        .query_map([group_id], lesson_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(lessons)
}

fn lesson_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Lesson> {
    Ok(Lesson {
        id: row.get(0)?,
        group_id: row.get(1)?,
        key: LessonKey {
            week_day: row.get(2)?,
            lesson_number: row.get(3)?,
            week_type: row.get(4)?,
        },
        details: LessonDetails {
            subject: row.get(5)?,
            teacher: row.get(6)?,
            room: row.get(7)?,
            start_time: row.get(8)?,
            end_time: row.get(9)?,
        },
    })
}

impl ToSql for WeekType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for WeekType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}
