//! End-to-end window processing from raw extract text to metrics.

use roas_core::config::AppConfig;
use roas_core::types::AdRowKind;
use roas_core::RoasError;
use roas_reporting::calculator::TOTAL_ATTRIBUTED;
use roas_reporting::ingest::{
    load_ad_performance, load_attribution, load_sales_ledger, read_ad_performance,
    read_attribution, read_book_sales, read_subscription_reads,
};
use roas_reporting::mapping::{load_mapping, read_mapping};
use roas_reporting::{Accumulator, Pipeline, SalesLedger, WindowInputs};

const MAPPING: &str = "\
FB Ad Name,Attribution Ad Group,Book 1,Book 2,Book 3,Book 4
A1,G1,The Iron Tide,,,
";

const FB_ADS: &str = "\
Ad name,Results,Amount spent (USD),Reach,Impressions,Cost per result
A1,50,$100.00,\"2,400\",\"3,100\",$2.00
";

const ATTRIBUTION_PROFILE_A: &str = "\
Ad group,Click-throughs,Purchases,KENP read,Estimated KENP royalties
G1,40,2,600,$2.70
";

const ATTRIBUTION_PROFILE_B: &str = "\
Ad group,Click-throughs,Purchases,KENP read,Estimated KENP royalties
G1,10,1,300,$1.35
UNMAPPED,5,4,0,
";

const SALES: &str = "\
Royalty Date,Title,Marketplace,Net Units Sold,Royalty
2025-01-05,The Iron Tide: Tidewar Book One,Amazon.com,4,$10.84
2025-01-06,The Iron Tide: Tidewar Book One,Amazon.de,1,$2.10
2024-12-20,The Iron Tide: Tidewar Book One,Amazon.com,9,$24.39
";

const READS: &str = "\
Date,Title,Marketplace,Kindle Edition Normalized Page (KENP) Read
2025-01-07,The Iron Tide: Tidewar Book One,Amazon.com,450
";

fn inputs() -> WindowInputs {
    let mut attribution = read_attribution(ATTRIBUTION_PROFILE_A.as_bytes(), "attr_a.csv").unwrap();
    attribution.extend(read_attribution(ATTRIBUTION_PROFILE_B.as_bytes(), "attr_b.csv").unwrap());
    WindowInputs {
        window: "2025-01-04:2025-01-11".parse().unwrap(),
        performance: read_ad_performance(FB_ADS.as_bytes(), "fb.csv").unwrap(),
        attribution,
        ledger: SalesLedger {
            sales: read_book_sales(SALES.as_bytes(), "sales.csv").unwrap(),
            reads: read_subscription_reads(READS.as_bytes(), "reads.csv").unwrap(),
        },
    }
}

#[test]
fn test_single_window_end_to_end() {
    let config = AppConfig::default();
    let mapping = read_mapping(MAPPING.as_bytes(), "mapping.csv").unwrap();
    let pipeline = Pipeline::new(&config, mapping).unwrap();

    let (accumulator, outcome) = pipeline.process_window(Accumulator::fresh(&config), &inputs());

    // Per-ad: purchases 3, 900 pages -> 2 books at 450 pages/book.
    let a1 = outcome
        .ad_rows
        .iter()
        .find(|r| r.ad_name == "A1")
        .unwrap();
    assert_eq!(a1.purchases, 3);
    assert!((a1.kenp_books - 2.0).abs() < 1e-9);
    assert!((a1.roas_attributed - 0.03).abs() < 1e-9);
    assert!((a1.roas_blended - 0.0694).abs() < 1e-9);
    assert!((a1.attributed_royalty - 12.07).abs() < 1e-9);
    assert!((a1.rolling_roas_blended.unwrap() - 0.0694).abs() < 1e-9);

    // Global: the unmapped ad group still counts toward window totals.
    let summary = &outcome.summary;
    assert_eq!(summary.attributed_sales, 7);
    assert!((summary.attributed_click_throughs - 55.0).abs() < 1e-9);
    assert_eq!(summary.fb_clicks, 50);
    // Ledger rows outside the window are ignored; all marketplaces count.
    assert!((summary.total_units_sold - 5.0).abs() < 1e-9);
    assert!((summary.total_royalties - 12.94).abs() < 1e-9);
    assert!((summary.roas_total - (12.94 + 4.05) / 100.0).abs() < 1e-9);

    // Reconciliation row.
    let total = outcome
        .ad_rows
        .iter()
        .find(|r| r.kind == AdRowKind::TotalAttributed)
        .unwrap();
    assert_eq!(total.ad_name, TOTAL_ATTRIBUTED);
    assert!((total.attributed_royalty - a1.attributed_royalty).abs() < 1e-9);
    assert!((total.ledger_royalty.unwrap() - 12.94).abs() < 1e-9);

    // Correlation row: Amazon.com only, 4 units + 1 book read.
    assert_eq!(outcome.correlation_rows.len(), 1);
    let corr = &outcome.correlation_rows[0];
    assert!((corr.linked_units_sold - 5.0).abs() < 1e-9);
    assert!((corr.linked_royalty - 10.84).abs() < 1e-9);
    assert!((corr.click_throughs - 50.0).abs() < 1e-9);

    assert_eq!(accumulator.trend.rows().len(), 2);
    assert_eq!(accumulator.correlation.rows().len(), 1);
}

#[test]
fn test_loaders_read_extracts_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let write = |name: &str, contents: &str| {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    };
    let mapping_path = write("mapping.csv", MAPPING);
    let performance_path = write("fb.csv", FB_ADS);
    let attribution_paths = vec![
        write("attr_a.csv", ATTRIBUTION_PROFILE_A),
        write("attr_b.csv", ATTRIBUTION_PROFILE_B),
    ];
    let sales_path = write("sales.csv", SALES);
    let reads_path = write("reads.csv", READS);

    let mapping = load_mapping(&mapping_path).unwrap();
    assert_eq!(mapping.len(), 1);

    let loaded = WindowInputs {
        window: "2025-01-04:2025-01-11".parse().unwrap(),
        performance: load_ad_performance(&performance_path).unwrap(),
        attribution: load_attribution(&attribution_paths).unwrap(),
        ledger: load_sales_ledger(&sales_path, &reads_path).unwrap(),
    };
    assert_eq!(loaded, inputs());
}

#[test]
fn test_missing_attribution_profile_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let present = dir.path().join("attr_a.csv");
    std::fs::write(&present, ATTRIBUTION_PROFILE_A).unwrap();
    let absent = dir.path().join("attr_b.csv");

    match load_attribution(&[present, absent.clone()]).unwrap_err() {
        RoasError::MissingInput { paths } => assert_eq!(paths, vec![absent]),
        other => panic!("unexpected error: {other}"),
    }
}
