//! Extract ingestion — reads the weekly CSV extracts into normalized records.
//!
//! Header matching is case-insensitive and whitespace-trimmed so minor
//! export differences between platform versions do not break a run. A
//! renamed or missing required column is a schema error listing the columns
//! that were actually observed.

use crate::normalize::{normalize_amount, normalize_count, normalize_required, CellRef};
use chrono::{NaiveDate, NaiveDateTime};
use roas_core::types::{
    AdPerformanceRecord, AttributionRecord, BookSaleRecord, SubscriptionReadRecord,
};
use roas_core::{AnalysisWindow, RoasError, RoasResult};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// ─── Column names ───────────────────────────────────────────────────────

pub mod columns {
    pub const AD_NAME: &str = "Ad name";
    pub const RESULTS: &str = "Results";
    pub const AMOUNT_SPENT: &str = "Amount spent (USD)";
    pub const REACH: &str = "Reach";
    pub const IMPRESSIONS: &str = "Impressions";
    pub const COST_PER_RESULT: &str = "Cost per result";

    pub const AD_GROUP: &str = "Ad group";
    pub const CLICK_THROUGHS: &str = "Click-throughs";
    pub const PURCHASES: &str = "Purchases";
    pub const KENP_READ: &str = "KENP read";
    pub const KENP_ROYALTIES: &str = "Estimated KENP royalties";

    pub const ROYALTY_DATE: &str = "Royalty Date";
    pub const TITLE: &str = "Title";
    pub const MARKETPLACE: &str = "Marketplace";
    pub const NET_UNITS_SOLD: &str = "Net Units Sold";
    pub const ROYALTY: &str = "Royalty";

    pub const DATE: &str = "Date";
    pub const KENP_PAGES_READ: &str = "Kindle Edition Normalized Page (KENP) Read";
}

// ─── Header map ─────────────────────────────────────────────────────────

/// Resolves column names to field positions for one extract.
#[derive(Debug, Clone)]
pub(crate) struct HeaderMap {
    idx: HashMap<String, usize>,
    observed: Vec<String>,
    source_name: String,
}

impl HeaderMap {
    pub(crate) fn from_headers(headers: &csv::StringRecord, source_name: &str) -> Self {
        let mut idx = HashMap::new();
        let mut observed = Vec::with_capacity(headers.len());
        for (i, h) in headers.iter().enumerate() {
            let h = h.trim().trim_start_matches('\u{feff}');
            idx.entry(h.to_ascii_lowercase()).or_insert(i);
            observed.push(h.to_string());
        }
        Self {
            idx,
            observed,
            source_name: source_name.to_string(),
        }
    }

    pub(crate) fn require(&self, column: &str) -> RoasResult<usize> {
        self.position(column).ok_or_else(|| RoasError::Schema {
            column: column.to_string(),
            source_name: self.source_name.clone(),
            observed: self.observed.clone(),
        })
    }

    pub(crate) fn position(&self, column: &str) -> Option<usize> {
        self.idx.get(&column.to_ascii_lowercase()).copied()
    }

    pub(crate) fn source_name(&self) -> &str {
        &self.source_name
    }
}

/// Field accessor; short rows read as blank cells.
pub(crate) fn field(record: &csv::StringRecord, i: usize) -> &str {
    record.get(i).unwrap_or("")
}

pub(crate) fn line_of(record: &csv::StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

pub(crate) fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
}

pub(crate) fn open(path: &Path) -> RoasResult<File> {
    if !path.exists() {
        return Err(RoasError::MissingInput {
            paths: vec![path.to_path_buf()],
        });
    }
    Ok(File::open(path)?)
}

fn cell<'a>(column: &'a str, headers: &'a HeaderMap, line: u64) -> CellRef<'a> {
    CellRef {
        column,
        source_name: headers.source_name(),
        line,
    }
}

fn dropped_row(source_name: &str, line: u64, reason: &str) {
    metrics::counter!("roas.ingest.rows_dropped").increment(1);
    debug!(source = source_name, line, reason, "Dropping extract row");
}

// ─── Ad-platform performance ────────────────────────────────────────────

/// Parse an ad-platform performance extract.
pub fn read_ad_performance<R: Read>(
    reader: R,
    source_name: &str,
) -> RoasResult<Vec<AdPerformanceRecord>> {
    let mut rdr = csv_reader(reader);
    let headers = HeaderMap::from_headers(rdr.headers()?, source_name);
    let ad_name = headers.require(columns::AD_NAME)?;
    let results = headers.require(columns::RESULTS)?;
    let spend = headers.require(columns::AMOUNT_SPENT)?;
    let reach = headers.position(columns::REACH);
    let impressions = headers.position(columns::IMPRESSIONS);
    let cost_per_result = headers.position(columns::COST_PER_RESULT);

    let mut records = Vec::new();
    for row in rdr.records() {
        let row = row?;
        let line = line_of(&row);
        let name = field(&row, ad_name);
        if name.is_empty() {
            dropped_row(source_name, line, "blank ad name");
            continue;
        }

        let spend_value = normalize_amount(
            field(&row, spend),
            cell(columns::AMOUNT_SPENT, &headers, line),
        )?;
        if spend_value < 0.0 {
            return Err(RoasError::DataFormat {
                column: columns::AMOUNT_SPENT.to_string(),
                source_name: source_name.to_string(),
                value: field(&row, spend).to_string(),
            });
        }

        let optional_count = |pos: Option<usize>, column: &str| -> RoasResult<Option<u64>> {
            match pos.map(|i| field(&row, i)).filter(|v| !v.is_empty()) {
                Some(raw) => normalize_count(raw, cell(column, &headers, line)).map(Some),
                None => Ok(None),
            }
        };

        records.push(AdPerformanceRecord {
            ad_name: name.to_string(),
            results: normalize_count(
                field(&row, results),
                cell(columns::RESULTS, &headers, line),
            )?,
            spend: spend_value,
            reach: optional_count(reach, columns::REACH)?,
            impressions: optional_count(impressions, columns::IMPRESSIONS)?,
            cost_per_result: match cost_per_result
                .map(|i| field(&row, i))
                .filter(|v| !v.is_empty())
            {
                Some(raw) => Some(normalize_amount(
                    raw,
                    cell(columns::COST_PER_RESULT, &headers, line),
                )?),
                None => None,
            },
        });
    }

    Ok(records)
}

pub fn load_ad_performance(path: &Path) -> RoasResult<Vec<AdPerformanceRecord>> {
    let records = read_ad_performance(open(path)?, &path.display().to_string())?;
    info!(path = %path.display(), ads = records.len(), "Loaded ad performance extract");
    Ok(records)
}

// ─── Attribution ────────────────────────────────────────────────────────

/// Parse one attribution extract. Click-throughs carry no default: a blank
/// cell fails the run instead of silently counting as zero.
pub fn read_attribution<R: Read>(
    reader: R,
    source_name: &str,
) -> RoasResult<Vec<AttributionRecord>> {
    let mut rdr = csv_reader(reader);
    let headers = HeaderMap::from_headers(rdr.headers()?, source_name);
    let ad_group = headers.require(columns::AD_GROUP)?;
    let click_throughs = headers.require(columns::CLICK_THROUGHS)?;
    let purchases = headers.require(columns::PURCHASES)?;
    let kenp_read = headers.require(columns::KENP_READ)?;
    let kenp_royalties = headers.require(columns::KENP_ROYALTIES)?;

    let mut records = Vec::new();
    for row in rdr.records() {
        let row = row?;
        let line = line_of(&row);
        records.push(AttributionRecord {
            ad_group: field(&row, ad_group).to_string(),
            click_throughs: normalize_required(
                field(&row, click_throughs),
                cell(columns::CLICK_THROUGHS, &headers, line),
            )?,
            purchases: normalize_count(
                field(&row, purchases),
                cell(columns::PURCHASES, &headers, line),
            )?,
            kenp_pages_read: normalize_count(
                field(&row, kenp_read),
                cell(columns::KENP_READ, &headers, line),
            )?,
            kenp_royalties: normalize_amount(
                field(&row, kenp_royalties),
                cell(columns::KENP_ROYALTIES, &headers, line),
            )?,
        });
    }

    Ok(records)
}

/// Concatenate every attribution extract for a window into one record set.
pub fn load_attribution(paths: &[PathBuf]) -> RoasResult<Vec<AttributionRecord>> {
    let missing: Vec<PathBuf> = paths.iter().filter(|p| !p.exists()).cloned().collect();
    if !missing.is_empty() || paths.is_empty() {
        return Err(RoasError::MissingInput { paths: missing });
    }

    let mut all = Vec::new();
    for path in paths {
        info!(path = %path.display(), "Processing attribution extract");
        let mut records = read_attribution(open(path)?, &path.display().to_string())?;
        all.append(&mut records);
    }
    Ok(all)
}

// ─── Sales ledger ───────────────────────────────────────────────────────

/// The two sheets of the publishing-platform royalty workbook.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SalesLedger {
    pub sales: Vec<BookSaleRecord>,
    pub reads: Vec<SubscriptionReadRecord>,
}

impl SalesLedger {
    /// Keep only rows dated inside the window.
    pub fn within(&self, window: &AnalysisWindow) -> SalesLedger {
        SalesLedger {
            sales: self
                .sales
                .iter()
                .filter(|s| window.contains(s.date))
                .cloned()
                .collect(),
            reads: self
                .reads
                .iter()
                .filter(|r| window.contains(r.date))
                .cloned()
                .collect(),
        }
    }

    pub fn total_units(&self) -> f64 {
        self.sales.iter().map(|s| s.net_units_sold).sum()
    }

    pub fn total_royalty(&self) -> f64 {
        self.sales.iter().map(|s| s.royalty).sum()
    }
}

/// Ledger dates arrive either as ISO dates, timestamps or US-style dates.
pub fn parse_ledger_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%m/%d/%Y"))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

pub fn read_book_sales<R: Read>(reader: R, source_name: &str) -> RoasResult<Vec<BookSaleRecord>> {
    let mut rdr = csv_reader(reader);
    let headers = HeaderMap::from_headers(rdr.headers()?, source_name);
    let date = headers.require(columns::ROYALTY_DATE)?;
    let title = headers.require(columns::TITLE)?;
    let marketplace = headers.require(columns::MARKETPLACE)?;
    let units = headers.require(columns::NET_UNITS_SOLD)?;
    let royalty = headers.require(columns::ROYALTY)?;

    let mut records = Vec::new();
    let mut undated = 0usize;
    for row in rdr.records() {
        let row = row?;
        let line = line_of(&row);
        let Some(day) = parse_ledger_date(field(&row, date)) else {
            undated += 1;
            dropped_row(source_name, line, "unparsable royalty date");
            continue;
        };
        records.push(BookSaleRecord {
            title: field(&row, title).to_string(),
            marketplace: field(&row, marketplace).to_string(),
            date: day,
            net_units_sold: normalize_amount(
                field(&row, units),
                cell(columns::NET_UNITS_SOLD, &headers, line),
            )?,
            royalty: normalize_amount(
                field(&row, royalty),
                cell(columns::ROYALTY, &headers, line),
            )?,
        });
    }

    if undated > 0 {
        warn!(source = source_name, rows = undated, "Dropped sales rows with unparsable dates");
    }
    Ok(records)
}

pub fn read_subscription_reads<R: Read>(
    reader: R,
    source_name: &str,
) -> RoasResult<Vec<SubscriptionReadRecord>> {
    let mut rdr = csv_reader(reader);
    let headers = HeaderMap::from_headers(rdr.headers()?, source_name);
    let date = headers.require(columns::DATE)?;
    let title = headers.require(columns::TITLE)?;
    let marketplace = headers.require(columns::MARKETPLACE)?;
    let pages = headers.require(columns::KENP_PAGES_READ)?;

    let mut records = Vec::new();
    let mut undated = 0usize;
    for row in rdr.records() {
        let row = row?;
        let line = line_of(&row);
        let Some(day) = parse_ledger_date(field(&row, date)) else {
            undated += 1;
            dropped_row(source_name, line, "unparsable read date");
            continue;
        };
        records.push(SubscriptionReadRecord {
            title: field(&row, title).to_string(),
            marketplace: field(&row, marketplace).to_string(),
            date: day,
            pages_read: normalize_count(
                field(&row, pages),
                cell(columns::KENP_PAGES_READ, &headers, line),
            )?,
        });
    }

    if undated > 0 {
        warn!(source = source_name, rows = undated, "Dropped read rows with unparsable dates");
    }
    Ok(records)
}

/// Load both ledger sheets, reporting every missing export at once.
pub fn load_sales_ledger(sales_path: &Path, reads_path: &Path) -> RoasResult<SalesLedger> {
    let missing: Vec<PathBuf> = [sales_path, reads_path]
        .iter()
        .filter(|p| !p.exists())
        .map(|p| p.to_path_buf())
        .collect();
    if !missing.is_empty() {
        return Err(RoasError::MissingInput { paths: missing });
    }

    let ledger = SalesLedger {
        sales: read_book_sales(open(sales_path)?, &sales_path.display().to_string())?,
        reads: read_subscription_reads(open(reads_path)?, &reads_path.display().to_string())?,
    };
    info!(
        sales_rows = ledger.sales.len(),
        read_rows = ledger.reads.len(),
        "Loaded sales ledger"
    );
    Ok(ledger)
}
