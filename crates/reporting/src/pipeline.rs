//! Window pipeline — folds an ordered batch of windows through
//! normalize → join → aggregate → metrics, threading the cross-window
//! accumulators explicitly.
//!
//! Each step is a pure function of (accumulator, window inputs); loading and
//! persistence live behind [`WindowSource`] and [`WindowSink`] and only run
//! at step boundaries.

use crate::attribution::{aggregate, report_ads_without_attribution};
use crate::calculator::MetricsCalculator;
use crate::correlation::{BookSalesCorrelator, CorrelationTable};
use crate::ingest::SalesLedger;
use crate::mapping::AdBookMapping;
use crate::trend::TrendTracker;
use roas_core::config::AppConfig;
use roas_core::types::{
    AdBookCorrelationRow, AdMetricsRow, AdPerformanceRecord, AttributionRecord, WindowSummary,
};
use roas_core::{AnalysisWindow, RoasResult, WindowBatch};
use tracing::info;

/// Already-located and normalized inputs for one window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowInputs {
    pub window: AnalysisWindow,
    pub performance: Vec<AdPerformanceRecord>,
    /// Every attribution extract for the window, concatenated.
    pub attribution: Vec<AttributionRecord>,
    /// The full ledger; rows outside the window are ignored.
    pub ledger: SalesLedger,
}

/// Cross-window state carried from one window to the next.
#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator {
    pub trend: TrendTracker,
    pub correlation: CorrelationTable,
}

impl Accumulator {
    /// Empty tables, used at the start of a batch.
    pub fn fresh(config: &AppConfig) -> Self {
        Self {
            trend: TrendTracker::new(&config.metrics),
            correlation: CorrelationTable::new(),
        }
    }

    /// Continue from tables persisted by earlier runs.
    pub fn resume(
        config: &AppConfig,
        ad_rows: Vec<AdMetricsRow>,
        correlation_rows: Vec<AdBookCorrelationRow>,
    ) -> Self {
        Self {
            trend: TrendTracker::with_history(&config.metrics, ad_rows),
            correlation: CorrelationTable::with_history(correlation_rows),
        }
    }
}

/// Everything one window produced.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowOutcome {
    pub summary: WindowSummary,
    /// Per-ad rows as stored in the trend table, rolling values filled in.
    pub ad_rows: Vec<AdMetricsRow>,
    pub correlation_rows: Vec<AdBookCorrelationRow>,
}

/// Supplies a window's inputs. Missing or malformed inputs are fatal.
pub trait WindowSource {
    fn load(&self, window: &AnalysisWindow) -> RoasResult<WindowInputs>;
}

/// Persists the accumulated tables after each window.
pub trait WindowSink {
    fn persist(&mut self, accumulator: &Accumulator, outcome: &WindowOutcome) -> RoasResult<()>;
}

pub struct Pipeline {
    mapping: AdBookMapping,
    calculator: MetricsCalculator,
    correlator: BookSalesCorrelator,
}

impl Pipeline {
    pub fn new(config: &AppConfig, mapping: AdBookMapping) -> RoasResult<Self> {
        config.validate()?;
        Ok(Self {
            mapping,
            calculator: MetricsCalculator::new(&config.metrics),
            correlator: BookSalesCorrelator::new(&config.ledger, &config.metrics),
        })
    }

    /// Process one window against the accumulated state.
    pub fn process_window(
        &self,
        mut accumulator: Accumulator,
        inputs: &WindowInputs,
    ) -> (Accumulator, WindowOutcome) {
        let window = &inputs.window;
        let ledger = inputs.ledger.within(window);

        let attribution = aggregate(&inputs.attribution, &self.mapping);
        report_ads_without_attribution(&inputs.performance, &attribution);

        let metrics = self
            .calculator
            .compute(window, &inputs.performance, &attribution, &ledger);
        let ad_rows = accumulator.trend.append(metrics.ad_rows).to_vec();

        let correlation_rows = self
            .correlator
            .window_rows(window, &ledger, &self.mapping, &attribution);
        accumulator.correlation.append(correlation_rows.clone());

        info!(
            window = %window,
            ad_rows = ad_rows.len(),
            correlation_rows = correlation_rows.len(),
            "Window processed"
        );

        (
            accumulator,
            WindowOutcome {
                summary: metrics.summary,
                ad_rows,
                correlation_rows,
            },
        )
    }

    /// Fold the batch in chronological order. A fatal error stops the fold;
    /// windows already handed to the sink keep their persisted output.
    pub fn run_batch<S, K>(
        &self,
        batch: &WindowBatch,
        mut accumulator: Accumulator,
        source: &S,
        sink: &mut K,
    ) -> RoasResult<Accumulator>
    where
        S: WindowSource + ?Sized,
        K: WindowSink + ?Sized,
    {
        for window in batch {
            info!(window = %window, "Analyzing window");
            let inputs = source.load(window)?;
            let (next, outcome) = self.process_window(accumulator, &inputs);
            sink.persist(&next, &outcome)?;
            accumulator = next;
        }
        Ok(accumulator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::read_mapping;
    use roas_core::types::AdRowKind;
    use roas_core::RoasError;
    use std::collections::HashMap;

    struct MemorySource {
        inputs: HashMap<AnalysisWindow, WindowInputs>,
    }

    impl WindowSource for MemorySource {
        fn load(&self, window: &AnalysisWindow) -> RoasResult<WindowInputs> {
            self.inputs
                .get(window)
                .cloned()
                .ok_or_else(|| RoasError::MissingInput { paths: vec![] })
        }
    }

    #[derive(Default)]
    struct MemorySink {
        summaries: Vec<WindowSummary>,
    }

    impl WindowSink for MemorySink {
        fn persist(&mut self, _: &Accumulator, outcome: &WindowOutcome) -> RoasResult<()> {
            self.summaries.push(outcome.summary.clone());
            Ok(())
        }
    }

    fn pipeline() -> Pipeline {
        let csv = "FB Ad Name,Attribution Ad Group,Book 1\nA1,G1,Tide\n";
        let mapping = read_mapping(csv.as_bytes(), "m.csv").unwrap();
        Pipeline::new(&AppConfig::default(), mapping).unwrap()
    }

    fn inputs(range: &str, purchases: u64) -> WindowInputs {
        WindowInputs {
            window: range.parse().unwrap(),
            performance: vec![AdPerformanceRecord {
                ad_name: "A1".into(),
                results: 10,
                spend: 10.0,
                reach: None,
                impressions: None,
                cost_per_result: None,
            }],
            attribution: vec![AttributionRecord {
                ad_group: "G1".into(),
                click_throughs: 5.0,
                purchases,
                kenp_pages_read: 0,
                kenp_royalties: 0.0,
            }],
            ledger: SalesLedger::default(),
        }
    }

    #[test]
    fn test_process_window_fills_rolling_value() {
        let pipeline = pipeline();
        let acc = Accumulator::fresh(&AppConfig::default());
        let (acc, first) = pipeline.process_window(acc, &inputs("2025-01-04:2025-01-11", 1));
        let (acc, second) = pipeline.process_window(acc, &inputs("2025-01-11:2025-01-18", 3));

        assert_eq!(first.ad_rows.len(), 2);
        assert_eq!(first.ad_rows[0].rolling_roas_blended, Some(0.1));
        let a1 = second.ad_rows.iter().find(|r| r.kind == AdRowKind::Ad).unwrap();
        assert!((a1.rolling_roas_blended.unwrap() - 0.2).abs() < 1e-9);
        assert_eq!(acc.trend.rows().len(), 4);
    }

    #[test]
    fn test_run_batch_stops_at_first_fatal_window() {
        let pipeline = pipeline();
        let good = inputs("2025-01-04:2025-01-11", 1);
        let source = MemorySource {
            inputs: HashMap::from([(good.window, good.clone())]),
        };
        let batch = WindowBatch::parse_lenient(&["2025-01-04:2025-01-11", "2025-01-11:2025-01-18"]);
        let mut sink = MemorySink::default();

        let result = pipeline.run_batch(
            &batch,
            Accumulator::fresh(&AppConfig::default()),
            &source,
            &mut sink,
        );

        assert!(result.is_err());
        assert_eq!(sink.summaries.len(), 1);
        assert_eq!(sink.summaries[0].window, "2025-01-04 to 2025-01-11");
    }

    #[test]
    fn test_resumed_run_for_earlier_window_rolls_chronologically() {
        let pipeline = pipeline();
        let config = AppConfig::default();
        let weeks = [
            inputs("2025-01-04:2025-01-11", 1),
            inputs("2025-01-11:2025-01-18", 5),
            inputs("2025-01-18:2025-01-25", 9),
        ];
        let source = MemorySource {
            inputs: weeks.iter().map(|w| (w.window, w.clone())).collect(),
        };
        let mut sink = MemorySink::default();

        let later = WindowBatch::parse_lenient(&["2025-01-11:2025-01-18", "2025-01-18:2025-01-25"]);
        let acc = pipeline
            .run_batch(&later, Accumulator::fresh(&config), &source, &mut sink)
            .unwrap();

        let resumed = Accumulator::resume(
            &config,
            acc.trend.rows().to_vec(),
            acc.correlation.rows().to_vec(),
        );
        let acc = pipeline
            .run_batch(&WindowBatch::single(weeks[0].window), resumed, &source, &mut sink)
            .unwrap();

        let rolling: Vec<(String, Option<f64>)> = acc
            .trend
            .rows()
            .iter()
            .filter(|r| r.kind == AdRowKind::Ad)
            .map(|r| (r.window.clone(), r.rolling_roas_blended))
            .collect();
        assert_eq!(rolling[0].0, "2025-01-04 to 2025-01-11");
        assert_eq!(rolling[0].1, Some(0.1));
        assert!((rolling[1].1.unwrap() - 0.3).abs() < 1e-9);
        assert!((rolling[2].1.unwrap() - 0.5).abs() < 1e-9);
    }
}
