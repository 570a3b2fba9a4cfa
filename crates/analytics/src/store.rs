//! Table store — persists the output tables as whole CSV files.
//!
//! Every write replaces the file via a temporary sibling and a rename, so a
//! failed run never leaves a half-written table behind. Only one pipeline
//! instance may target a given output directory at a time.

use roas_core::config::OutputsConfig;
use roas_core::types::{AdBookCorrelationRow, AdCorrelationSummary, AdMetricsRow, WindowSummary};
use roas_core::RoasResult;
use roas_reporting::{Accumulator, WindowOutcome, WindowSink};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Read a table; a missing file is an empty table.
pub fn read_table<T: DeserializeOwned>(path: &Path) -> RoasResult<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut rows = Vec::new();
    for row in rdr.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Replace a table with `rows`.
pub fn write_table<T: Serialize>(path: &Path, rows: &[T]) -> RoasResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);
    {
        let mut wtr = csv::Writer::from_path(&tmp)?;
        for row in rows {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
    }
    fs::rename(&tmp, path)?;
    debug!(path = %path.display(), rows = rows.len(), "Table written");
    Ok(())
}

/// Append rows to an existing table, creating it when absent. Returns the
/// table's new row count.
pub fn append_table<T>(path: &Path, rows: &[T]) -> RoasResult<usize>
where
    T: Serialize + DeserializeOwned + Clone,
{
    let mut existing: Vec<T> = read_table(path)?;
    existing.extend_from_slice(rows);
    write_table(path, &existing)?;
    Ok(existing.len())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Output tables for one destination directory.
#[derive(Debug, Clone)]
pub struct TableStore {
    outputs: OutputsConfig,
}

impl TableStore {
    pub fn new(outputs: &OutputsConfig) -> Self {
        Self {
            outputs: outputs.clone(),
        }
    }

    pub fn load_weekly_summaries(&self) -> RoasResult<Vec<WindowSummary>> {
        read_table(&self.outputs.weekly_summary_path())
    }

    pub fn load_ad_rows(&self) -> RoasResult<Vec<AdMetricsRow>> {
        read_table(&self.outputs.ad_summary_path())
    }

    pub fn load_correlation_rows(&self) -> RoasResult<Vec<AdBookCorrelationRow>> {
        read_table(&self.outputs.correlation_path())
    }

    pub fn load_correlation_summary(&self) -> RoasResult<Vec<AdCorrelationSummary>> {
        read_table(&self.outputs.correlation_summary_path())
    }

    pub fn write_correlation_summary(&self, summaries: &[AdCorrelationSummary]) -> RoasResult<()> {
        let path = self.outputs.correlation_summary_path();
        write_table(&path, summaries)?;
        info!(path = %path.display(), ads = summaries.len(), "Correlation summary written");
        Ok(())
    }
}

impl WindowSink for TableStore {
    /// The weekly summary is append-only across runs; the per-ad and
    /// correlation tables are rewritten whole from the accumulator.
    fn persist(&mut self, accumulator: &Accumulator, outcome: &WindowOutcome) -> RoasResult<()> {
        let weekly = self.outputs.weekly_summary_path();
        append_table(&weekly, std::slice::from_ref(&outcome.summary))?;
        write_table(&self.outputs.ad_summary_path(), accumulator.trend.rows())?;
        write_table(&self.outputs.correlation_path(), accumulator.correlation.rows())?;
        info!(
            window = %outcome.summary.window,
            output_dir = %self.outputs.output_dir.display(),
            "Window tables persisted"
        );
        Ok(())
    }
}
