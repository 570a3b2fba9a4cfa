//! Ad-spend reconciliation — joins ad-platform spend, marketplace attribution
//! and publishing royalties into per-window ROAS metrics, a rolling trend and
//! a cross-window click/sales correlation.

pub mod attribution;
pub mod calculator;
pub mod correlation;
pub mod ingest;
pub mod mapping;
pub mod normalize;
pub mod pipeline;
pub mod trend;

pub use attribution::AttributionAggregate;
pub use calculator::MetricsCalculator;
pub use correlation::{BookSalesCorrelator, CorrelationTable};
pub use ingest::SalesLedger;
pub use mapping::AdBookMapping;
pub use pipeline::{Accumulator, Pipeline, WindowInputs, WindowOutcome, WindowSink, WindowSource};
pub use trend::TrendTracker;
