//! Input discovery for batch QC runs
//!
//! Expands a glob pattern into station inputs. Each CSV file is one
//! station; the station name is the file stem, made unique when two files
//! share a stem.

use crate::error::{QcError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One CSV file to QC and the station it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationInput {
    pub station: String,
    pub path: PathBuf,
}

impl StationInput {
    pub fn new(station: impl Into<String>, path: PathBuf) -> Self {
        Self {
            station: station.into(),
            path,
        }
    }

    /// Station named after the file stem
    pub fn from_path(path: PathBuf) -> Self {
        let station = station_name(&path);
        Self { station, path }
    }
}

/// Glob-based discovery of station CSV files
#[derive(Debug)]
pub struct FileDiscovery {
    pattern: String,
}

impl FileDiscovery {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    /// Discover CSV files matching the pattern, sorted by path
    pub fn discover(&self) -> Result<Vec<StationInput>> {
        let entries = glob::glob(&self.pattern).map_err(|e| {
            QcError::configuration(format!("Invalid input pattern '{}': {}", self.pattern, e))
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    debug!("Skipping unreadable path: {}", e);
                    None
                }
            })
            .filter(|path| path.is_file() && is_csv_file(path))
            .collect();
        files.sort();

        let mut seen: HashMap<String, usize> = HashMap::new();
        let inputs: Vec<StationInput> = files
            .into_iter()
            .map(|path| {
                let base = station_name(&path);
                let count = seen.entry(base.clone()).or_insert(0);
                *count += 1;
                let station = if *count == 1 {
                    base
                } else {
                    format!("{}-{}", base, count)
                };
                StationInput::new(station, path)
            })
            .collect();

        debug!(
            "Pattern '{}' matched {} station files",
            self.pattern,
            inputs.len()
        );
        Ok(inputs)
    }
}

/// Station name derived from a file stem
pub fn station_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("station")
        .to_string()
}

/// Check if a path is a CSV file
fn is_csv_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}
