//! Source loading: fetch a published sheet and decode it into a [`RawGrid`]

use crate::error::{Error, Result};
use crate::grid::RawGrid;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

/// Where the timetable CSV comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceLocator {
    /// Anything reachable over HTTP(S)
    Url(String),
    /// A CSV export on the local filesystem
    Path(PathBuf),
}

impl SourceLocator {
    /// Interpret a user-supplied string as a URL or a file path
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.starts_with("http://") || value.starts_with("https://") {
            SourceLocator::Url(value.to_string())
        } else {
            SourceLocator::Path(PathBuf::from(value))
        }
    }

    /// CSV export URL of a Google Sheet published to the web
    pub fn published_sheet(sheet_id: &str) -> Self {
        SourceLocator::Url(format!(
            "https://docs.google.com/spreadsheets/d/e/{}/pub?output=csv",
            sheet_id.trim()
        ))
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocator::Url(url) => write!(f, "{}", url),
            SourceLocator::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// How to cut the header out of the raw CSV lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridOptions {
    /// Lines dropped before the header row
    pub skip_rows: usize,
}

impl Default for GridOptions {
    fn default() -> Self {
        // Published sheets carry a banner line above the column captions
        Self { skip_rows: 1 }
    }
}

/// Fetch the source and decode it into a grid.
///
/// Performs no validation beyond CSV decoding; sparse and malformed cells are
/// passed through untouched.
pub async fn fetch(locator: &SourceLocator, options: &GridOptions) -> Result<RawGrid> {
    let started = Instant::now();
    info!(source = %locator, "loading schedule grid");

    let content = match locator {
        SourceLocator::Url(url) => fetch_url(url).await?,
        SourceLocator::Path(path) => {
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| Error::FileRead {
                    path: path.clone(),
                    source: e,
                })?
        }
    };

    let grid = parse_grid_str(&content, &locator.to_string(), options)?;
    info!(
        rows = grid.row_count(),
        columns = grid.width(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "schedule grid loaded"
    );
    Ok(grid)
}

async fn fetch_url(url: &str) -> Result<String> {
    let response = reqwest::get(url)
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| Error::Fetch {
            url: url.to_string(),
            source: e,
        })?;
    debug!(url, status = %response.status(), "sheet responded");

    response.text().await.map_err(|e| Error::Fetch {
        url: url.to_string(),
        source: e,
    })
}

/// Decode CSV text into a grid (also used directly by tests)
pub fn parse_grid_str(content: &str, locator: &str, options: &GridOptions) -> Result<RawGrid> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true) // Rows in exported sheets are ragged
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for result in csv_reader.records().skip(options.skip_rows) {
        let record = result.map_err(|e| Error::Csv {
            locator: locator.to_string(),
            source: e,
        })?;

        let cells: Vec<Option<String>> = record
            .iter()
            .map(|field| (!field.is_empty()).then(|| field.to_string()))
            .collect();
        rows.push(cells);
    }

    Ok(RawGrid::new(rows))
}
