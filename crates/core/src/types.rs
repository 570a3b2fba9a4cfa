use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ─── Normalized input records ───────────────────────────────────────────

/// One advertised creative's performance for a window.
#[derive(Debug, Clone, PartialEq)]
pub struct AdPerformanceRecord {
    pub ad_name: String,
    /// Platform-defined "result" count (link clicks for these campaigns).
    pub results: u64,
    pub spend: f64,
    pub reach: Option<u64>,
    pub impressions: Option<u64>,
    pub cost_per_result: Option<f64>,
}

/// One attribution ad-group row for a window.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributionRecord {
    pub ad_group: String,
    pub click_throughs: f64,
    pub purchases: u64,
    pub kenp_pages_read: u64,
    pub kenp_royalties: f64,
}

/// Static link between an ad-platform ad, an attribution ad group and the
/// books the ad promotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    pub ad_name: String,
    pub ad_group: String,
    pub linked_books: BTreeSet<String>,
}

/// One row of the "combined sales" ledger sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct BookSaleRecord {
    pub title: String,
    pub marketplace: String,
    pub date: NaiveDate,
    pub net_units_sold: f64,
    pub royalty: f64,
}

/// One row of the subscription-read ledger sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionReadRecord {
    pub title: String,
    pub marketplace: String,
    pub date: NaiveDate,
    pub pages_read: u64,
}

// ─── Output tables ──────────────────────────────────────────────────────

/// Window-global summary, one row per processed window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSummary {
    pub window: String,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub fb_clicks: u64,
    pub attributed_click_throughs: f64,
    pub attributed_sales: u64,
    pub attributed_kenp_pages: u64,
    pub attributed_kenp_books: f64,
    pub attributed_kenp_royalties: f64,
    pub total_units_sold: f64,
    pub total_royalties: f64,
    pub spend: f64,
    pub roas_attributed: f64,
    pub roas_total: f64,
    pub roas_blended: f64,
}

/// Distinguishes real ads from the synthetic reconciliation row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdRowKind {
    Ad,
    TotalAttributed,
}

/// Per-ad metrics for one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdMetricsRow {
    pub window: String,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub kind: AdRowKind,
    pub ad_name: String,
    pub spend: f64,
    pub fb_clicks: u64,
    pub click_throughs: f64,
    pub purchases: u64,
    pub kenp_pages: u64,
    pub kenp_books: f64,
    pub kenp_royalties: f64,
    pub roas_attributed: f64,
    pub roas_blended: f64,
    /// Subscription royalty only; attribution carries no per-ad sale royalty.
    pub roas_kenp_royalty: f64,
    pub attributed_royalty: f64,
    /// Ledger royalty for the window, set only on the reconciliation row.
    pub ledger_royalty: Option<f64>,
    pub rolling_roas_blended: Option<f64>,
}

/// Linked-book activity attributed to one ad for one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdBookCorrelationRow {
    pub window: String,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub ad_name: String,
    pub linked_units_sold: f64,
    pub linked_royalty: f64,
    pub click_throughs: f64,
}

/// Cross-window correlation between an ad's clicks and its linked book sales.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdCorrelationSummary {
    pub ad_name: String,
    pub correlation: Option<f64>,
    pub window_count: usize,
}
