//! Catalogue persistence.
//!
//! Reads and writes the tab-separated opening tables. Writes go to a
//! temporary file in the destination directory and are renamed into
//! place, so readers never see a half-written table.

pub mod prepare;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::types::{EnrichedRecord, EnricherError, OpeningRecord};
use prepare::RawOpening;

const DELIMITER: u8 = b'\t';

/// Outcome of a `prepare` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareSummary {
    pub openings: usize,
    pub max_move_count: u32,
}

/// Build the prepared catalogue from raw lichess opening files.
pub fn prepare(raw_paths: &[PathBuf], output: &Path) -> Result<PrepareSummary> {
    let mut records = Vec::new();
    for path in raw_paths {
        let raw: Vec<RawOpening> = read_table(path)?;
        info!(path = %path.display(), rows = raw.len(), "Read raw openings");
        records.extend(raw.into_iter().map(RawOpening::into_record));
    }

    let summary = PrepareSummary {
        openings: records.len(),
        max_move_count: max_move_count(&records),
    };
    info!(max_move_count = summary.max_move_count, "Maximum move count");

    write_table(output, &records)?;
    info!(path = %output.display(), openings = summary.openings, "Catalogue written");

    Ok(summary)
}

/// Load the prepared catalogue.
pub fn read_openings(path: &Path) -> Result<Vec<OpeningRecord>> {
    let records: Vec<OpeningRecord> = read_table(path)?;
    if records.is_empty() {
        return Err(EnricherError::Catalogue {
            path: path.display().to_string(),
            message: "catalogue has no rows".to_string(),
        }
        .into());
    }
    info!(path = %path.display(), openings = records.len(), "Catalogue loaded");
    Ok(records)
}

/// Write the enriched table in one go.
pub fn write_enriched(path: &Path, records: &[EnrichedRecord]) -> Result<()> {
    let rows: Vec<_> = records.iter().map(EnrichedRecord::to_row).collect();
    write_table(path, &rows)?;
    info!(path = %path.display(), rows = rows.len(), "Enriched table written");
    Ok(())
}

pub fn max_move_count(records: &[OpeningRecord]) -> u32 {
    records.iter().map(|r| r.move_count).max().unwrap_or(0)
}

fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut rows = Vec::new();
    for (i, row) in reader.deserialize().enumerate() {
        // Header is line 1.
        let row: T = row.with_context(|| format!("{}: bad row at line {}", path.display(), i + 2))?;
        rows.push(row);
    }
    Ok(rows)
}

fn write_table<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let output_err = |message: String| EnricherError::Output {
        path: path.display().to_string(),
        message,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)
        .map_err(|e| output_err(format!("cannot create temporary file in {}: {e}", dir.display())))?;

    {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(DELIMITER)
            .from_writer(&mut tmp);
        for row in rows {
            writer.serialize(row).map_err(|e| output_err(e.to_string()))?;
        }
        writer.flush().map_err(|e| output_err(e.to_string()))?;
    }

    tmp.persist(path).map_err(|e| output_err(e.error.to_string()))?;
    debug!(path = %path.display(), rows = rows.len(), "Table persisted");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
