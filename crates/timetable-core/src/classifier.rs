//! Header classification into metadata, group and room columns

use crate::config::MetadataLayout;
use crate::grid::clean_cell;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Prefix given to columns with a blank caption
pub const UNNAMED_PREFIX: &str = "Unnamed";

/// Suffix marking a room column (the first repeat of its group's caption)
pub const ROOM_SUFFIX: &str = ".1";

/// A group's column in the grid, with its room column if the sheet has one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupColumn {
    pub name: String,
    pub index: usize,
    pub room_index: Option<usize>,
}

/// Result of classifying a header row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Group columns in header order
    pub groups: Vec<GroupColumn>,
}

impl Classification {
    /// Find a group column by name
    pub fn find_group(&self, name: &str) -> Option<&GroupColumn> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Get all group names
    pub fn group_names(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.name.as_str()).collect()
    }
}

/// Give every header cell a unique, non-empty name.
///
/// Blank captions become `Unnamed: {index}`; a caption seen before gets
/// `.1`, `.2`, … appended, so a room column captioned like its group turns
/// into `{group}.1`.
pub fn normalize_headers(header: &[Option<String>]) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    let mut repeats: HashMap<String, usize> = HashMap::new();
    let mut names = Vec::with_capacity(header.len());

    for (index, cell) in header.iter().enumerate() {
        let base = match clean_cell(cell.as_deref()) {
            Some(caption) => caption.to_string(),
            None => format!("{}: {}", UNNAMED_PREFIX, index),
        };

        let mut name = base.clone();
        if used.contains(&name) {
            let count = repeats.entry(base.clone()).or_insert(0);
            loop {
                *count += 1;
                let candidate = format!("{}.{}", base, count);
                if !used.contains(&candidate) {
                    name = candidate;
                    break;
                }
            }
        }

        used.insert(name.clone());
        names.push(name);
    }

    names
}

/// Partition the header into group columns and their room columns.
///
/// Purely structural; data rows are never inspected.
pub fn classify(header: &[Option<String>], layout: &MetadataLayout) -> Classification {
    let names = normalize_headers(header);

    let position: HashMap<&str, usize> = names
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_str(), i))
        .collect();

    let groups = names
        .iter()
        .enumerate()
        .skip(layout.first_group_column)
        .filter(|(_, name)| !name.starts_with(UNNAMED_PREFIX) && !name.ends_with(ROOM_SUFFIX))
        .map(|(index, name)| GroupColumn {
            name: name.clone(),
            index,
            room_index: position
                .get(format!("{}{}", name, ROOM_SUFFIX).as_str())
                .copied(),
        })
        .collect();

    Classification { groups }
}
