//! Lesson and group types shared by extraction, reconciliation and queries

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Surrogate id of a persisted group
pub type GroupId = i64;

/// Surrogate id of a persisted lesson
pub type LessonId = i64;

/// Alternating week variant of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekType {
    Numerator,
    Denominator,
}

impl WeekType {
    /// Canonical identifier, as stored
    pub fn as_str(&self) -> &'static str {
        match self {
            WeekType::Numerator => "numerator",
            WeekType::Denominator => "denominator",
        }
    }
}

impl fmt::Display for WeekType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WeekType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "numerator" => Ok(WeekType::Numerator),
            "denominator" => Ok(WeekType::Denominator),
            other => Err(format!("unknown week type: {other}")),
        }
    }
}

/// Natural identity of a lesson slot within one group
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LessonKey {
    /// ISO weekday, Monday = 1
    pub week_day: u8,
    /// 1-based lesson ordinal
    pub lesson_number: u8,
    pub week_type: WeekType,
}

impl fmt::Display for LessonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "day {} lesson {} ({})",
            self.week_day, self.lesson_number, self.week_type
        )
    }
}

/// Non-key fields of a lesson; any difference here means an update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonDetails {
    pub subject: String,
    pub teacher: Option<String>,
    pub room: Option<String>,
    /// "HH:MM"
    pub start_time: Option<String>,
    /// "HH:MM"
    pub end_time: Option<String>,
}

/// A lesson decoded from the grid, not yet persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonRecord {
    pub group_name: String,
    #[serde(flatten)]
    pub key: LessonKey,
    #[serde(flatten)]
    pub details: LessonDetails,
}

/// A persisted group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
}

/// A persisted lesson
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: LessonId,
    pub group_id: GroupId,
    #[serde(flatten)]
    pub key: LessonKey,
    #[serde(flatten)]
    pub details: LessonDetails,
}

/// Write request for the store: insert when `id` is `None`, update in place otherwise
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonUpsert {
    pub id: Option<LessonId>,
    pub group_id: GroupId,
    pub key: LessonKey,
    pub details: LessonDetails,
}
