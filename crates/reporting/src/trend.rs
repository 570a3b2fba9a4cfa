//! Trend tracker — cross-window per-ad table with a rolling blended ROAS.

use roas_core::config::MetricsConfig;
use roas_core::types::{AdMetricsRow, AdRowKind};
use std::collections::HashMap;
use tracing::debug;

/// Table of per-ad rows across windows, kept in window-start order.
///
/// The rolling mean is taken over each ad's rows in table order, so rows
/// are placed chronologically whatever order windows are processed in.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendTracker {
    window: usize,
    min_periods: usize,
    rows: Vec<AdMetricsRow>,
}

impl TrendTracker {
    pub fn new(config: &MetricsConfig) -> Self {
        Self {
            window: config.rolling_window,
            min_periods: config.rolling_min_periods,
            rows: Vec::new(),
        }
    }

    /// Resume from a previously persisted table.
    pub fn with_history(config: &MetricsConfig, mut rows: Vec<AdMetricsRow>) -> Self {
        // Stable: reruns of one window keep their relative order.
        rows.sort_by_key(|r| r.window_start);
        let mut tracker = Self::new(config);
        tracker.rows = rows;
        tracker.recompute();
        tracker
    }

    /// Insert one window's rows after every row starting on or before it,
    /// recompute the rolling column over the full history and return the
    /// inserted rows.
    pub fn append(&mut self, rows: Vec<AdMetricsRow>) -> &[AdMetricsRow] {
        let Some(start) = rows.first().map(|r| r.window_start) else {
            return &[];
        };
        let at = self.rows.partition_point(|r| r.window_start <= start);
        if at < self.rows.len() {
            debug!(window_start = %start, "Window precedes persisted history, inserting in order");
        }
        let inserted = rows.len();
        self.rows.splice(at..at, rows);
        self.recompute();
        &self.rows[at..at + inserted]
    }

    pub fn rows(&self) -> &[AdMetricsRow] {
        &self.rows
    }

    fn recompute(&mut self) {
        let mut history: HashMap<String, Vec<f64>> = HashMap::new();
        for row in &mut self.rows {
            if row.kind != AdRowKind::Ad {
                row.rolling_roas_blended = None;
                continue;
            }
            let values = history.entry(row.ad_name.clone()).or_default();
            values.push(row.roas_blended);
            row.rolling_roas_blended = rolling_mean(values, self.window, self.min_periods);
        }
        debug!(ads = history.len(), rows = self.rows.len(), "Rolling blended ROAS recomputed");
    }
}

/// Mean of the trailing `window` values, or `None` with fewer than
/// `min_periods` observations.
pub fn rolling_mean(values: &[f64], window: usize, min_periods: usize) -> Option<f64> {
    let tail = &values[values.len().saturating_sub(window)..];
    if tail.is_empty() || tail.len() < min_periods {
        return None;
    }
    Some(tail.iter().sum::<f64>() / tail.len() as f64)
}
