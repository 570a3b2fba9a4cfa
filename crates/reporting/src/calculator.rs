//! ROAS calculator — ROAS variants and attributed royalty for one window.
//!
//! Every ratio over spend resolves to 0.0 when spend is zero so the trend
//! and correlation stages never see NaN or infinity.

use crate::attribution::{AttributionAggregate, AttributionTotals};
use crate::ingest::SalesLedger;
use roas_core::config::MetricsConfig;
use roas_core::types::{AdMetricsRow, AdPerformanceRecord, AdRowKind, WindowSummary};
use roas_core::AnalysisWindow;
use std::collections::HashMap;
use tracing::info;

pub const TOTAL_ATTRIBUTED: &str = "TOTAL ATTRIBUTED";

/// `numerator / spend`, or 0.0 when there was no spend.
pub fn ratio_over_spend(numerator: f64, spend: f64) -> f64 {
    if spend > 0.0 {
        numerator / spend
    } else {
        0.0
    }
}

/// Ledger royalty minus the sum of per-ad attributed royalty.
pub fn reconciliation_delta(total_row: &AdMetricsRow) -> Option<f64> {
    total_row
        .ledger_royalty
        .map(|ledger| ledger - total_row.attributed_royalty)
}

/// Spend and result counts summed per ad name.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct AdSpend {
    spend: f64,
    results: u64,
}

/// One window's computed metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowMetrics {
    pub summary: WindowSummary,
    /// Per-ad rows followed by the synthetic reconciliation row.
    pub ad_rows: Vec<AdMetricsRow>,
}

pub struct MetricsCalculator {
    pages_per_book: f64,
    kenp_multiplier: f64,
    profit_per_ebook: f64,
}

impl MetricsCalculator {
    pub fn new(config: &MetricsConfig) -> Self {
        Self {
            pages_per_book: config.pages_per_book,
            kenp_multiplier: config.kenp_multiplier,
            profit_per_ebook: config.profit_per_ebook,
        }
    }

    pub fn subscription_books(&self, pages_read: u64) -> f64 {
        pages_read as f64 / self.pages_per_book
    }

    pub fn roas_attributed(&self, purchases: u64, spend: f64) -> f64 {
        ratio_over_spend(purchases as f64, spend)
    }

    pub fn roas_blended(&self, purchases: u64, subscription_books: f64, spend: f64) -> f64 {
        ratio_over_spend(
            purchases as f64 + subscription_books * self.kenp_multiplier,
            spend,
        )
    }

    pub fn attributed_royalty(&self, purchases: u64, subscription_books: f64) -> f64 {
        purchases as f64 * self.profit_per_ebook + subscription_books * self.kenp_multiplier
    }

    /// Global summary. `ledger` must already be filtered to the window.
    pub fn window_summary(
        &self,
        window: &AnalysisWindow,
        performance: &[AdPerformanceRecord],
        attribution: &AttributionAggregate,
        ledger: &SalesLedger,
    ) -> WindowSummary {
        let totals = attribution.totals;
        let spend: f64 = performance.iter().map(|p| p.spend).sum();
        let fb_clicks: u64 = performance.iter().map(|p| p.results).sum();
        let kenp_books = self.subscription_books(totals.kenp_pages_read);
        let sales_royalty = ledger.total_royalty();

        WindowSummary {
            window: window.label(),
            window_start: window.start(),
            window_end: window.end(),
            fb_clicks,
            attributed_click_throughs: totals.click_throughs,
            attributed_sales: totals.purchases,
            attributed_kenp_pages: totals.kenp_pages_read,
            attributed_kenp_books: kenp_books,
            attributed_kenp_royalties: totals.kenp_royalties,
            total_units_sold: ledger.total_units(),
            total_royalties: sales_royalty,
            spend,
            roas_attributed: self.roas_attributed(totals.purchases, spend),
            // Global form includes direct sale royalty from the ledger.
            roas_total: ratio_over_spend(sales_royalty + totals.kenp_royalties, spend),
            roas_blended: self.roas_blended(totals.purchases, kenp_books, spend),
        }
    }

    /// One row per ad name present in the attribution data, sorted by name.
    pub fn ad_rows(
        &self,
        window: &AnalysisWindow,
        performance: &[AdPerformanceRecord],
        attribution: &AttributionAggregate,
    ) -> Vec<AdMetricsRow> {
        let mut spend_by_ad: HashMap<&str, AdSpend> = HashMap::new();
        for record in performance {
            let entry = spend_by_ad.entry(record.ad_name.as_str()).or_default();
            entry.spend += record.spend;
            entry.results += record.results;
        }

        attribution
            .by_ad
            .iter()
            .map(|(ad_name, totals)| {
                let spend = spend_by_ad.get(ad_name.as_str()).copied().unwrap_or_default();
                self.ad_row(window, ad_name, spend, totals)
            })
            .collect()
    }

    fn ad_row(
        &self,
        window: &AnalysisWindow,
        ad_name: &str,
        spend: AdSpend,
        totals: &AttributionTotals,
    ) -> AdMetricsRow {
        let kenp_books = self.subscription_books(totals.kenp_pages_read);
        AdMetricsRow {
            window: window.label(),
            window_start: window.start(),
            window_end: window.end(),
            kind: AdRowKind::Ad,
            ad_name: ad_name.to_string(),
            spend: spend.spend,
            fb_clicks: spend.results,
            click_throughs: totals.click_throughs,
            purchases: totals.purchases,
            kenp_pages: totals.kenp_pages_read,
            kenp_books,
            kenp_royalties: totals.kenp_royalties,
            roas_attributed: self.roas_attributed(totals.purchases, spend.spend),
            roas_blended: self.roas_blended(totals.purchases, kenp_books, spend.spend),
            // Per-ad form: attribution carries no direct sale royalty per ad.
            roas_kenp_royalty: ratio_over_spend(totals.kenp_royalties, spend.spend),
            attributed_royalty: self.attributed_royalty(totals.purchases, kenp_books),
            ledger_royalty: None,
            rolling_roas_blended: None,
        }
    }

    /// Synthetic row whose attributed royalty is exactly the sum over `ad_rows`,
    /// set against the ledger's independently sourced royalty.
    pub fn reconciliation_row(
        &self,
        window: &AnalysisWindow,
        ad_rows: &[AdMetricsRow],
        ledger_royalty: f64,
    ) -> AdMetricsRow {
        let ads = ad_rows.iter().filter(|r| r.kind == AdRowKind::Ad);
        let mut total = AdMetricsRow {
            window: window.label(),
            window_start: window.start(),
            window_end: window.end(),
            kind: AdRowKind::TotalAttributed,
            ad_name: TOTAL_ATTRIBUTED.to_string(),
            spend: 0.0,
            fb_clicks: 0,
            click_throughs: 0.0,
            purchases: 0,
            kenp_pages: 0,
            kenp_books: 0.0,
            kenp_royalties: 0.0,
            roas_attributed: 0.0,
            roas_blended: 0.0,
            roas_kenp_royalty: 0.0,
            attributed_royalty: 0.0,
            ledger_royalty: Some(ledger_royalty),
            rolling_roas_blended: None,
        };
        for row in ads {
            total.spend += row.spend;
            total.fb_clicks += row.fb_clicks;
            total.click_throughs += row.click_throughs;
            total.purchases += row.purchases;
            total.kenp_pages += row.kenp_pages;
            total.kenp_books += row.kenp_books;
            total.kenp_royalties += row.kenp_royalties;
            total.attributed_royalty += row.attributed_royalty;
        }
        total.roas_attributed = self.roas_attributed(total.purchases, total.spend);
        total.roas_blended = self.roas_blended(total.purchases, total.kenp_books, total.spend);
        total.roas_kenp_royalty = ratio_over_spend(total.kenp_royalties, total.spend);
        total
    }

    /// Global summary, per-ad rows and the reconciliation row for one window.
    pub fn compute(
        &self,
        window: &AnalysisWindow,
        performance: &[AdPerformanceRecord],
        attribution: &AttributionAggregate,
        ledger: &SalesLedger,
    ) -> WindowMetrics {
        let summary = self.window_summary(window, performance, attribution, ledger);
        let mut ad_rows = self.ad_rows(window, performance, attribution);
        let total = self.reconciliation_row(window, &ad_rows, summary.total_royalties);

        info!(
            window = %window,
            spend = summary.spend,
            roas_attributed = summary.roas_attributed,
            roas_blended = summary.roas_blended,
            roas_total = summary.roas_total,
            ads = ad_rows.len(),
            attributed_royalty = total.attributed_royalty,
            ledger_royalty = summary.total_royalties,
            "Window metrics computed"
        );

        ad_rows.push(total);
        WindowMetrics { summary, ad_rows }
    }
}
