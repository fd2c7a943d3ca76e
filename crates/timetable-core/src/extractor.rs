//! Row-pair decoding of the grid into lesson records
//!
//! Each scheduled slot spans two rows. The primary row carries weekday,
//! lesson number, week type, start time and the subject; the secondary row
//! carries end time, teacher and room. Rows that do not decode into a slot
//! are stepped over one at a time until the walk falls back into step.

use crate::classifier::{classify, GroupColumn};
use crate::config::MetadataLayout;
use crate::error::{Error, Result};
use crate::grid::RawGrid;
use crate::model::{LessonDetails, LessonKey, LessonRecord, WeekType};
use crate::tokens;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Row pairs that were dropped because a token could not be decoded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipCounts {
    pub unknown_weekday: usize,
    pub unknown_lesson_number: usize,
    pub unknown_week_type: usize,
    /// Later pairs that repeated an identity key already seen for the group
    pub duplicate_key: usize,
}

impl SkipCounts {
    pub fn total(&self) -> usize {
        self.unknown_weekday + self.unknown_lesson_number + self.unknown_week_type + self.duplicate_key
    }

    pub fn add(&mut self, other: &SkipCounts) {
        self.unknown_weekday += other.unknown_weekday;
        self.unknown_lesson_number += other.unknown_lesson_number;
        self.unknown_week_type += other.unknown_week_type;
        self.duplicate_key += other.duplicate_key;
    }
}

/// A row pair that belongs to the timetable structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    /// Data row index of the primary row
    pub row: usize,
    pub week_day: u8,
    pub lesson_number: u8,
    /// `None` when the marker was missing or unrecognised
    pub week_type: Option<WeekType>,
}

/// Slots found in the shared metadata columns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotScan {
    pub slots: Vec<Slot>,
    pub skipped: SkipCounts,
}

/// Lessons found for one group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupExtraction {
    pub group: String,
    pub lessons: Vec<LessonRecord>,
    pub skipped: SkipCounts,
}

/// Everything one pass parsed out of the grid
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedSchedule {
    /// One entry per group column, in header order
    pub groups: Vec<GroupExtraction>,
    pub skipped: SkipCounts,
}

impl ParsedSchedule {
    pub fn group_names(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.group.as_str()).collect()
    }

    pub fn lesson_count(&self) -> usize {
        self.groups.iter().map(|g| g.lessons.len()).sum()
    }

    pub fn find_group(&self, name: &str) -> Option<&GroupExtraction> {
        self.groups.iter().find(|g| g.group == name)
    }
}

/// Walk the metadata columns two rows at a time.
///
/// A pair whose weekday and lesson-number tokens decode is a slot and the
/// walk advances by two rows; anything else advances by one.
pub fn scan_slots(grid: &RawGrid, layout: &MetadataLayout) -> SlotScan {
    let rows = grid.data_rows().len();
    let mut scan = SlotScan::default();
    let mut row = 0;

    while row + 1 < rows {
        let week_day = match grid.cell(row, layout.day_column) {
            None => {
                row += 1;
                continue;
            }
            Some(token) => match tokens::weekday(token) {
                Some(day) => day,
                None => {
                    debug!(row, token, "unrecognised weekday token");
                    scan.skipped.unknown_weekday += 1;
                    row += 1;
                    continue;
                }
            },
        };

        let lesson_number = match grid.cell(row, layout.lesson_column) {
            None => {
                row += 1;
                continue;
            }
            Some(token) => match tokens::lesson_number(token) {
                Some(n) => n,
                None => {
                    debug!(row, token, "unrecognised lesson number token");
                    scan.skipped.unknown_lesson_number += 1;
                    row += 1;
                    continue;
                }
            },
        };

        let marker = grid.cell(row, layout.week_type_column);
        let week_type = marker.and_then(tokens::week_type);
        if week_type.is_none() {
            warn!(
                row,
                week_day,
                lesson_number,
                marker = marker.unwrap_or(""),
                "slot has no recognisable week type, dropping it"
            );
            scan.skipped.unknown_week_type += 1;
        }

        scan.slots.push(Slot {
            row,
            week_day,
            lesson_number,
            week_type,
        });
        row += 2;
    }

    scan
}

/// Read one group's lessons out of already-scanned slots.
///
/// Slots without a subject for this group are blank and produce nothing.
/// If two slots share an identity key the later one wins.
pub fn read_group(
    grid: &RawGrid,
    slots: &[Slot],
    group: &GroupColumn,
    layout: &MetadataLayout,
) -> GroupExtraction {
    let mut lessons: Vec<LessonRecord> = Vec::new();
    let mut seen: HashMap<LessonKey, usize> = HashMap::new();
    let mut skipped = SkipCounts::default();

    for slot in slots {
        let Some(week_type) = slot.week_type else {
            continue;
        };
        let Some(subject) = grid.cell(slot.row, group.index) else {
            continue;
        };

        let second = slot.row + 1;
        let key = LessonKey {
            week_day: slot.week_day,
            lesson_number: slot.lesson_number,
            week_type,
        };
        let record = LessonRecord {
            group_name: group.name.clone(),
            key,
            details: LessonDetails {
                subject: subject.to_string(),
                teacher: grid.cell(second, group.index).map(str::to_string),
                room: group
                    .room_index
                    .and_then(|col| grid.cell(second, col))
                    .map(str::to_string),
                start_time: time_cell(grid, slot.row, layout.time_column),
                end_time: time_cell(grid, second, layout.time_column),
            },
        };

        match seen.get(&key) {
            Some(&index) => {
                warn!(group = %group.name, %key, "duplicate slot, keeping the later one");
                skipped.duplicate_key += 1;
                lessons[index] = record;
            }
            None => {
                seen.insert(key, lessons.len());
                lessons.push(record);
            }
        }
    }

    GroupExtraction {
        group: group.name.clone(),
        lessons,
        skipped,
    }
}

fn time_cell(grid: &RawGrid, row: usize, col: usize) -> Option<String> {
    let token = grid.cell(row, col)?;
    let time = tokens::clock_time(token);
    if time.is_none() {
        debug!(row, token, "unrecognised time token");
    }
    time
}

/// Extract one group's lessons straight from the grid
pub fn extract_lessons(grid: &RawGrid, group: &GroupColumn, layout: &MetadataLayout) -> GroupExtraction {
    let scan = scan_slots(grid, layout);
    let mut extraction = read_group(grid, &scan.slots, group, layout);
    extraction.skipped.add(&scan.skipped);
    extraction
}

/// Classify the header and extract every group.
///
/// Fails if the grid cannot hold a single row pair or its header names no
/// group. Either way nothing downstream may treat it as an empty timetable.
pub fn parse_schedule(grid: &RawGrid, layout: &MetadataLayout, locator: &str) -> Result<ParsedSchedule> {
    let data_rows = grid.data_rows().len();
    if data_rows < 2 {
        return Err(Error::GridTooShort {
            locator: locator.to_string(),
            data_rows,
        });
    }

    let classification = classify(grid.header(), layout);
    if classification.groups.is_empty() {
        return Err(Error::NoGroupColumns {
            locator: locator.to_string(),
            width: grid.width(),
        });
    }

    let scan = scan_slots(grid, layout);
    let mut skipped = scan.skipped;

    let groups: Vec<GroupExtraction> = classification
        .groups
        .iter()
        .map(|group| {
            let extraction = read_group(grid, &scan.slots, group, layout);
            debug!(
                group = %group.name,
                lessons = extraction.lessons.len(),
                "group extracted"
            );
            skipped.add(&extraction.skipped);
            extraction
        })
        .collect();

    Ok(ParsedSchedule { groups, skipped })
}
