//! Book-sales correlator — attributes ledger activity to ads through the
//! mapping's linked books and correlates it with click volume across windows.

use crate::attribution::AttributionAggregate;
use crate::ingest::SalesLedger;
use crate::mapping::{title_matches, AdBookMapping};
use roas_core::config::{LedgerConfig, MetricsConfig};
use roas_core::types::{AdBookCorrelationRow, AdCorrelationSummary};
use roas_core::AnalysisWindow;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Ledger activity for one title within a window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TitleActivity {
    pub units_sold: f64,
    pub royalty: f64,
    pub pages_read: u64,
}

pub struct BookSalesCorrelator {
    marketplace: String,
    pages_per_book: f64,
}

impl BookSalesCorrelator {
    pub fn new(ledger: &LedgerConfig, metrics: &MetricsConfig) -> Self {
        Self {
            marketplace: ledger.marketplace.clone(),
            pages_per_book: metrics.pages_per_book,
        }
    }

    /// Aggregate the target marketplace's sales and reads by title.
    /// `ledger` must already be filtered to the window.
    pub fn title_activity(&self, ledger: &SalesLedger) -> BTreeMap<String, TitleActivity> {
        let mut by_title: BTreeMap<String, TitleActivity> = BTreeMap::new();
        for sale in ledger.sales.iter().filter(|s| s.marketplace == self.marketplace) {
            let entry = by_title.entry(sale.title.clone()).or_default();
            entry.units_sold += sale.net_units_sold;
            entry.royalty += sale.royalty;
        }
        for read in ledger.reads.iter().filter(|r| r.marketplace == self.marketplace) {
            by_title.entry(read.title.clone()).or_default().pages_read += read.pages_read;
        }
        by_title
    }

    /// One row per ad with nonzero linked-book activity in the window.
    ///
    /// A title matching several ads counts in full toward each of them.
    pub fn window_rows(
        &self,
        window: &AnalysisWindow,
        ledger: &SalesLedger,
        mapping: &AdBookMapping,
        attribution: &AttributionAggregate,
    ) -> Vec<AdBookCorrelationRow> {
        let activity = self.title_activity(ledger);

        let mut books_by_ad: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for entry in mapping.entries() {
            books_by_ad
                .entry(entry.ad_name.as_str())
                .or_default()
                .extend(entry.linked_books.iter().map(String::as_str));
        }

        let mut matched_titles: BTreeSet<&str> = BTreeSet::new();
        let mut rows = Vec::new();
        for (ad_name, books) in &books_by_ad {
            let mut linked = TitleActivity::default();
            for (title, title_activity) in &activity {
                if title_matches(title, books.iter().copied()) {
                    matched_titles.insert(title.as_str());
                    linked.units_sold += title_activity.units_sold;
                    linked.royalty += title_activity.royalty;
                    linked.pages_read += title_activity.pages_read;
                }
            }

            let units = linked.units_sold + linked.pages_read as f64 / self.pages_per_book;
            if units == 0.0 && linked.royalty == 0.0 {
                debug!(ad_name = %ad_name, window = %window, "No linked-book activity");
                continue;
            }

            rows.push(AdBookCorrelationRow {
                window: window.label(),
                window_start: window.start(),
                window_end: window.end(),
                ad_name: ad_name.to_string(),
                linked_units_sold: units,
                linked_royalty: linked.royalty,
                click_throughs: attribution.for_ad(ad_name).click_throughs,
            });
        }

        let unmatched: Vec<&str> = activity
            .keys()
            .map(String::as_str)
            .filter(|t| !matched_titles.contains(t))
            .collect();
        for title in &unmatched {
            warn!(title = %title, window = %window, "Ledger title matches no mapping entry");
        }
        metrics::counter!("roas.join.unmatched_titles").increment(unmatched.len() as u64);

        rows
    }
}

/// Cross-window table of per-ad linked-book activity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrelationTable {
    rows: Vec<AdBookCorrelationRow>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(rows: Vec<AdBookCorrelationRow>) -> Self {
        Self { rows }
    }

    pub fn append(&mut self, rows: Vec<AdBookCorrelationRow>) {
        self.rows.extend(rows);
    }

    pub fn rows(&self) -> &[AdBookCorrelationRow] {
        &self.rows
    }

    /// Per-ad Pearson correlation between click-throughs and linked units sold.
    ///
    /// A window processed more than once contributes only its latest row.
    pub fn summarize(&self) -> Vec<AdCorrelationSummary> {
        let mut groups: BTreeMap<&str, BTreeMap<&str, &AdBookCorrelationRow>> = BTreeMap::new();
        for row in &self.rows {
            groups
                .entry(row.ad_name.as_str())
                .or_default()
                .insert(row.window.as_str(), row);
        }

        let summaries: Vec<AdCorrelationSummary> = groups
            .into_iter()
            .map(|(ad_name, by_window)| {
                let clicks: Vec<f64> = by_window.values().map(|r| r.click_throughs).collect();
                let units: Vec<f64> = by_window.values().map(|r| r.linked_units_sold).collect();
                AdCorrelationSummary {
                    ad_name: ad_name.to_string(),
                    correlation: pearson(&clicks, &units),
                    window_count: by_window.len(),
                }
            })
            .collect();

        info!(
            ads = summaries.len(),
            defined = summaries.iter().filter(|s| s.correlation.is_some()).count(),
            "Ad-book correlation summarized"
        );
        summaries
    }
}

fn has_variation(values: &[f64]) -> bool {
    values.first().map_or(false, |first| values.iter().any(|v| v != first))
}

/// Pearson correlation coefficient; `None` unless both series vary.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 || !has_variation(xs) || !has_variation(ys) {
        return None;
    }

    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    Some((cov / denom).clamp(-1.0, 1.0))
}
