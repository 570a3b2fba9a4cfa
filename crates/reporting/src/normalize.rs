//! Record normalizer — turns locale-formatted extract cells into numbers.
//!
//! Rules, applied in order: strip thousands separators, strip currency
//! symbols, then treat a blank cell as the column default. Any residue that
//! still fails to parse is a data-format error naming the column and file.

use roas_core::{RoasError, RoasResult};

const CURRENCY_SYMBOLS: [char; 4] = ['$', '€', '£', '¥'];

/// Where a cell came from, for error reporting.
#[derive(Debug, Clone, Copy)]
pub struct CellRef<'a> {
    pub column: &'a str,
    pub source_name: &'a str,
    pub line: u64,
}

/// What a blank cell means for a column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlankPolicy {
    Default(f64),
    /// A blank cell is a data-quality error.
    Required,
}

/// Remove thousands separators, currency symbols and surrounding whitespace.
pub fn strip_formatting(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| *c != ',' && !CURRENCY_SYMBOLS.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Normalize a cell to a finite float according to its blank policy.
pub fn normalize_value(raw: &str, policy: BlankPolicy, cell: CellRef<'_>) -> RoasResult<f64> {
    let cleaned = strip_formatting(raw);
    if cleaned.is_empty() {
        return match policy {
            BlankPolicy::Default(value) => Ok(value),
            BlankPolicy::Required => Err(RoasError::MissingValue {
                column: cell.column.to_string(),
                source_name: cell.source_name.to_string(),
                line: cell.line,
            }),
        };
    }

    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(format_error(raw, cell)),
    }
}

/// Monetary amount; blank means zero.
pub fn normalize_amount(raw: &str, cell: CellRef<'_>) -> RoasResult<f64> {
    normalize_value(raw, BlankPolicy::Default(0.0), cell)
}

/// Non-negative whole count; blank means zero.
pub fn normalize_count(raw: &str, cell: CellRef<'_>) -> RoasResult<u64> {
    let value = normalize_value(raw, BlankPolicy::Default(0.0), cell)?;
    if value < 0.0 || value.fract() != 0.0 || value >= u64::MAX as f64 {
        return Err(format_error(raw, cell));
    }
    Ok(value as u64)
}

/// Float with no default; blank cells fail the run.
pub fn normalize_required(raw: &str, cell: CellRef<'_>) -> RoasResult<f64> {
    normalize_value(raw, BlankPolicy::Required, cell)
}

fn format_error(raw: &str, cell: CellRef<'_>) -> RoasError {
    RoasError::DataFormat {
        column: cell.column.to_string(),
        source_name: cell.source_name.to_string(),
        value: raw.to_string(),
    }
}
