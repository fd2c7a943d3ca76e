//! Error types for timetable-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in timetable-core
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP fetch of the published sheet failed
    #[error("failed to fetch '{url}': {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Failed to read a local source file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV decoding error from the csv crate
    #[error("CSV error in '{locator}': {source}")]
    Csv {
        locator: String,
        #[source]
        source: csv::Error,
    },

    /// Grid has no room for a single row pair
    #[error("grid from '{locator}' is too short: {data_rows} data row(s)")]
    GridTooShort { locator: String, data_rows: usize },

    /// Header holds no group column past the metadata block
    #[error("grid from '{locator}' has no group columns ({width} column(s))")]
    NoGroupColumns { locator: String, width: usize },

    /// SQLite error
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Another sync pass holds the run lock
    #[error("a sync pass is already in flight")]
    PassInFlight,

    /// Invalid or incomplete configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Group requested by a query does not exist
    #[error("group not found: {0}")]
    GroupNotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse failure classes reported to whoever schedules sync passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The source could not be fetched or decoded into a usable grid
    SourceUnavailable,
    /// The store rejected a read or the pass commit
    StorageFailure,
    /// A pass was already running
    Busy,
    Config,
    Other,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Fetch { .. }
            | Error::FileRead { .. }
            | Error::Csv { .. }
            | Error::GridTooShort { .. }
            | Error::NoGroupColumns { .. } => ErrorKind::SourceUnavailable,
            Error::Storage(_) => ErrorKind::StorageFailure,
            Error::PassInFlight => ErrorKind::Busy,
            Error::Config(_) => ErrorKind::Config,
            Error::GroupNotFound(_) | Error::Io(_) | Error::Json(_) => ErrorKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_errors_are_source_unavailable() {
        let err = Error::GridTooShort {
            locator: "sheet.csv".to_string(),
            data_rows: 1,
        };
        assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
        assert!(err.to_string().contains("sheet.csv"));

        let err = Error::NoGroupColumns {
            locator: "login.html".to_string(),
            width: 1,
        };
        assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    }

    #[test]
    fn test_storage_errors_are_storage_failure() {
        let err = Error::from(rusqlite::Error::QueryReturnedNoRows);
        assert_eq!(err.kind(), ErrorKind::StorageFailure);
        assert_eq!(Error::PassInFlight.kind(), ErrorKind::Busy);
    }
}
