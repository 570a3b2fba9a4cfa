//! Attribution aggregator — joins attribution ad groups to ad-platform ads
//! through the mapping and sums their activity per ad.

use crate::mapping::AdBookMapping;
use roas_core::types::{AdPerformanceRecord, AttributionRecord};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Summed attribution activity.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AttributionTotals {
    pub click_throughs: f64,
    pub purchases: u64,
    pub kenp_pages_read: u64,
    pub kenp_royalties: f64,
}

impl AttributionTotals {
    pub fn add(&mut self, record: &AttributionRecord) {
        self.click_throughs += record.click_throughs;
        self.purchases += record.purchases;
        self.kenp_pages_read += record.kenp_pages_read;
        self.kenp_royalties += record.kenp_royalties;
    }
}

/// One window's attribution, grouped by resolved ad name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributionAggregate {
    /// Only ad groups present in the mapping contribute here.
    pub by_ad: BTreeMap<String, AttributionTotals>,
    /// Every row, mapped or not.
    pub totals: AttributionTotals,
    pub unmapped_ad_groups: BTreeSet<String>,
}

impl AttributionAggregate {
    pub fn for_ad(&self, ad_name: &str) -> AttributionTotals {
        self.by_ad.get(ad_name).copied().unwrap_or_default()
    }

    /// Ad-platform ads that received no attribution rows after the join.
    pub fn ads_without_attribution<'a>(
        &self,
        performance: &'a [AdPerformanceRecord],
    ) -> Vec<&'a str> {
        let mut seen = BTreeSet::new();
        performance
            .iter()
            .map(|p| p.ad_name.as_str())
            .filter(|name| !self.by_ad.contains_key(*name))
            .filter(|name| seen.insert(*name))
            .collect()
    }
}

/// Left-join attribution rows to the mapping and group by ad name.
///
/// The caller concatenates every extract for the window first; rows with no
/// mapping entry still count toward the window totals.
pub fn aggregate(records: &[AttributionRecord], mapping: &AdBookMapping) -> AttributionAggregate {
    let mut result = AttributionAggregate::default();

    for record in records {
        result.totals.add(record);
        match mapping.resolve_ad(&record.ad_group) {
            Some(resolved) => result
                .by_ad
                .entry(resolved.ad_name.to_string())
                .or_default()
                .add(record),
            None => {
                result.unmapped_ad_groups.insert(record.ad_group.clone());
            }
        }
    }

    for ad_group in &result.unmapped_ad_groups {
        warn!(ad_group = %ad_group, "Attribution ad group has no mapping entry");
    }
    metrics::counter!("roas.join.unmapped_ad_groups")
        .increment(result.unmapped_ad_groups.len() as u64);

    result
}

/// Log ad-platform ads left without attribution; partial coverage is expected.
pub fn report_ads_without_attribution(
    performance: &[AdPerformanceRecord],
    aggregate: &AttributionAggregate,
) -> usize {
    let missing = aggregate.ads_without_attribution(performance);
    for ad_name in &missing {
        warn!(ad_name = %ad_name, "Ad has no attribution rows after join");
    }
    metrics::counter!("roas.join.ads_without_attribution").increment(missing.len() as u64);
    missing.len()
}
