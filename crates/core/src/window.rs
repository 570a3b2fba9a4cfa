//! Analysis windows and chronologically ordered batches of windows.

use crate::error::{RoasError, RoasResult};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// One reporting period, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "WindowBounds", into = "WindowBounds")]
pub struct AnalysisWindow {
    start: NaiveDate,
    end: NaiveDate,
}

/// Serialized form; bounds are validated on the way back in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WindowBounds {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TryFrom<WindowBounds> for AnalysisWindow {
    type Error = RoasError;

    fn try_from(bounds: WindowBounds) -> RoasResult<Self> {
        Self::new(bounds.start, bounds.end)
    }
}

impl From<AnalysisWindow> for WindowBounds {
    fn from(window: AnalysisWindow) -> Self {
        Self {
            start: window.start,
            end: window.end,
        }
    }
}

impl AnalysisWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> RoasResult<Self> {
        if start > end {
            return Err(RoasError::InvalidWindow(format!(
                "start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// The last complete week ending on a Saturday, at least one full week
    /// before `today`.
    pub fn last_complete_week(today: NaiveDate) -> Self {
        let weekday = i64::from(today.weekday().num_days_from_monday());
        let end = today - Duration::days((weekday + 2) % 7 + 7);
        let start = end - Duration::days(7);
        Self { start, end }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Human readable label used as the join key in every output table.
    pub fn label(&self) -> String {
        format!("{} to {}", self.start, self.end)
    }

    /// Fragment embedded in the weekly extract file names.
    pub fn file_stem(&self) -> String {
        format!("{}_to_{}", self.start, self.end)
    }
}

impl fmt::Display for AnalysisWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for AnalysisWindow {
    type Err = RoasError;

    /// Accepts `START:END`, `START..END`, `START to END` and `START_to_END`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (start, end) = [" to ", "_to_", "..", ":"]
            .iter()
            .find_map(|sep| s.split_once(sep))
            .ok_or_else(|| RoasError::InvalidWindow(format!("'{s}' is not a date pair")))?;

        let parse = |raw: &str| {
            NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .map_err(|e| RoasError::InvalidWindow(format!("'{s}': {e}")))
        };
        Self::new(parse(start)?, parse(end)?)
    }
}

/// Windows sorted by start date with duplicates removed. Trailing-window
/// metrics are only meaningful when windows are folded in this order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowBatch {
    windows: Vec<AnalysisWindow>,
}

impl WindowBatch {
    pub fn from_windows(mut windows: Vec<AnalysisWindow>) -> Self {
        if windows.windows(2).any(|pair| pair[0] > pair[1]) {
            warn!("Windows supplied out of chronological order, re-sorting batch");
        }
        windows.sort();
        let before = windows.len();
        windows.dedup();
        if windows.len() < before {
            warn!(dropped = before - windows.len(), "Duplicate windows removed from batch");
        }
        Self { windows }
    }

    /// Parse caller-supplied window strings. Unparsable entries are skipped with
    /// a warning so the rest of the batch still runs.
    pub fn parse_lenient<S: AsRef<str>>(raw_windows: &[S]) -> Self {
        let windows = raw_windows
            .iter()
            .filter_map(|raw| match raw.as_ref().parse::<AnalysisWindow>() {
                Ok(window) => Some(window),
                Err(e) => {
                    warn!(window = raw.as_ref(), error = %e, "Skipping invalid window");
                    None
                }
            })
            .collect();
        Self::from_windows(windows)
    }

    pub fn single(window: AnalysisWindow) -> Self {
        Self {
            windows: vec![window],
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AnalysisWindow> {
        self.windows.iter()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

impl<'a> IntoIterator for &'a WindowBatch {
    type Item = &'a AnalysisWindow;
    type IntoIter = std::slice::Iter<'a, AnalysisWindow>;

    fn into_iter(self) -> Self::IntoIter {
        self.windows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_last_complete_week_from_wednesday() {
        // 2025-01-15 is a Wednesday; the most recent Saturday is 01-11 and
        // the window ends one week earlier on 01-04.
        let window = AnalysisWindow::last_complete_week(date("2025-01-15"));
        assert_eq!(window.end(), date("2025-01-04"));
        assert_eq!(window.start(), date("2024-12-28"));
    }

    #[test]
    fn test_last_complete_week_from_saturday() {
        let window = AnalysisWindow::last_complete_week(date("2025-01-11"));
        assert_eq!(window.end(), date("2025-01-04"));
    }

    #[test]
    fn test_parse_separators() {
        let expected = AnalysisWindow::new(date("2025-01-04"), date("2025-01-11")).unwrap();
        for raw in [
            "2025-01-04:2025-01-11",
            "2025-01-04..2025-01-11",
            "2025-01-04 to 2025-01-11",
            "2025-01-04_to_2025-01-11",
        ] {
            assert_eq!(raw.parse::<AnalysisWindow>().unwrap(), expected);
        }
    }

    #[test]
    fn test_rejects_reversed_bounds() {
        assert!("2025-01-11:2025-01-04".parse::<AnalysisWindow>().is_err());
    }

    #[test]
    fn test_deserialize_checks_bounds() {
        let window: AnalysisWindow =
            serde_json::from_str(r#"{"start":"2025-01-04","end":"2025-01-11"}"#).unwrap();
        assert_eq!(window.end(), date("2025-01-11"));
        assert!(serde_json::from_str::<AnalysisWindow>(r#"{"start":"2025-01-11","end":"2025-01-04"}"#).is_err());
    }

    #[test]
    fn test_contains_is_inclusive() {
        let window = AnalysisWindow::new(date("2025-01-04"), date("2025-01-11")).unwrap();
        assert!(window.contains(date("2025-01-04")));
        assert!(window.contains(date("2025-01-11")));
        assert!(!window.contains(date("2025-01-12")));
    }

    #[test]
    fn test_batch_sorts_dedups_and_skips_invalid() {
        let batch = WindowBatch::parse_lenient(&[
            "2025-01-11:2025-01-18",
            "garbage",
            "2025-01-04:2025-01-11",
            "2025-01-11:2025-01-18",
        ]);
        let labels: Vec<String> = batch.iter().map(|w| w.label()).collect();
        assert_eq!(
            labels,
            vec!["2025-01-04 to 2025-01-11", "2025-01-11 to 2025-01-18"]
        );
    }
}
