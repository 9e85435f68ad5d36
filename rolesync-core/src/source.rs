//! Desired-state CSV adapter.
//!
//! Expects a header row with `username` and `status` columns. Extra columns
//! are ignored, ragged rows are tolerated, and rows without a username are
//! dropped silently.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::error::SourceError;
use crate::types::{DesiredRecord, DesiredStatus};

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Read desired records from a CSV file on disk.
pub fn read_desired_file(path: &Path) -> Result<Vec<DesiredRecord>, SourceError> {
    let file = std::fs::File::open(path).map_err(|e| SourceError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    read_desired(file, &path.display().to_string())
}

/// Read desired records from any reader. `origin` labels errors.
pub fn read_desired<R: Read>(reader: R, origin: &str) -> Result<Vec<DesiredRecord>, SourceError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let mut records = Vec::new();
    for row in csv_reader.deserialize::<CsvRow>() {
        let row = row.map_err(|e| SourceError::Csv {
            origin: origin.to_string(),
            source: e,
        })?;
        let Some(username) = row.username.filter(|u| !u.is_empty()) else {
            continue;
        };
        let status = row
            .status
            .as_deref()
            .map(DesiredStatus::parse)
            .unwrap_or_default();
        records.push(DesiredRecord::new(username, status));
    }
    Ok(records)
}
