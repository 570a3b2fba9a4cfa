//! Ad-book mapping resolver — links attribution ad groups to ad-platform ads
//! and to the book titles each ad promotes.

use crate::ingest::{csv_reader, field, open, HeaderMap};
use roas_core::types::MappingEntry;
use roas_core::RoasResult;
use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

pub const FB_AD_NAME: &str = "FB Ad Name";
pub const ATTRIBUTION_AD_GROUP: &str = "Attribution Ad Group";
pub const BOOK_COLUMNS: [&str; 4] = ["Book 1", "Book 2", "Book 3", "Book 4"];

/// An ad-platform ad resolved from an attribution ad group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedAd<'a> {
    pub ad_name: &'a str,
    pub linked_books: &'a BTreeSet<String>,
}

/// True when a ledger title contains any candidate book string.
///
/// Ledger titles carry subtitle and edition variants, so the match is a
/// case-insensitive substring test. One candidate that is a substring of
/// another title will match both.
pub fn title_matches<'a, I>(title: &str, candidates: I) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    let title = title.to_lowercase();
    candidates.into_iter().any(|candidate| {
        let candidate = candidate.trim();
        !candidate.is_empty() && title.contains(&candidate.to_lowercase())
    })
}

/// Static, read-only mapping loaded once per run.
#[derive(Debug, Clone, Default)]
pub struct AdBookMapping {
    entries: Vec<MappingEntry>,
    by_ad_group: HashMap<String, usize>,
}

impl AdBookMapping {
    pub fn new(entries: Vec<MappingEntry>) -> Self {
        let mut by_ad_group = HashMap::new();
        for (i, entry) in entries.iter().enumerate() {
            if by_ad_group.contains_key(&entry.ad_group) {
                warn!(ad_group = %entry.ad_group, "Duplicate ad group in mapping, keeping first entry");
                continue;
            }
            by_ad_group.insert(entry.ad_group.clone(), i);
        }
        Self {
            entries,
            by_ad_group,
        }
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn resolve_ad(&self, ad_group: &str) -> Option<ResolvedAd<'_>> {
        self.by_ad_group.get(ad_group).map(|&i| {
            let entry = &self.entries[i];
            ResolvedAd {
                ad_name: &entry.ad_name,
                linked_books: &entry.linked_books,
            }
        })
    }

    /// Ad names whose linked books match `title`, deduplicated, in mapping order.
    pub fn resolve_book_ads(&self, title: &str) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.entries
            .iter()
            .filter(|e| title_matches(title, e.linked_books.iter().map(String::as_str)))
            .filter(|e| seen.insert(e.ad_name.as_str()))
            .map(|e| e.ad_name.as_str())
            .collect()
    }
}

/// Parse the mapping table; up to four book columns collapse into one set.
pub fn read_mapping<R: Read>(reader: R, source_name: &str) -> RoasResult<AdBookMapping> {
    let mut rdr = csv_reader(reader);
    let headers = HeaderMap::from_headers(rdr.headers()?, source_name);
    let ad_name = headers.require(FB_AD_NAME)?;
    let ad_group = headers.require(ATTRIBUTION_AD_GROUP)?;
    let books: Vec<usize> = BOOK_COLUMNS
        .iter()
        .filter_map(|c| headers.position(c))
        .collect();

    let mut entries = Vec::new();
    for row in rdr.records() {
        let row = row?;
        let name = field(&row, ad_name);
        let group = field(&row, ad_group);
        if name.is_empty() && group.is_empty() {
            continue;
        }
        let linked_books = books
            .iter()
            .map(|&i| field(&row, i))
            .filter(|b| !b.is_empty())
            .map(str::to_string)
            .collect();
        entries.push(MappingEntry {
            ad_name: name.to_string(),
            ad_group: group.to_string(),
            linked_books,
        });
    }

    Ok(AdBookMapping::new(entries))
}

/// Load the mapping table. Without it no result is meaningful, so a missing
/// file fails the run.
pub fn load_mapping(path: &Path) -> RoasResult<AdBookMapping> {
    let mapping = read_mapping(open(path)?, &path.display().to_string())?;
    info!(path = %path.display(), entries = mapping.len(), "Loaded ad-book mapping");
    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use roas_core::RoasError;

    const MAPPING_CSV: &str = "\
FB Ad Name,Attribution Ad Group,Book 1,Book 2,Book 3,Book 4
A1,G1,The Iron Tide,,,
A2,G2,Saltmarsh,The Iron Tide,,
,,,,,
A3,G3,,,,
";

    fn mapping() -> AdBookMapping {
        read_mapping(MAPPING_CSV.as_bytes(), "mapping.csv").unwrap()
    }

    #[test]
    fn test_collapses_book_columns() {
        let mapping = mapping();
        assert_eq!(mapping.len(), 3);
        let a2 = mapping.resolve_ad("G2").unwrap();
        assert_eq!(a2.ad_name, "A2");
        assert_eq!(a2.linked_books.len(), 2);
        assert!(mapping.resolve_ad("G3").unwrap().linked_books.is_empty());
    }

    #[test]
    fn test_unknown_ad_group_resolves_to_none() {
        assert!(mapping().resolve_ad("G9").is_none());
    }

    #[test]
    fn test_resolve_book_ads_uses_substring_match() {
        let mapping = mapping();
        let ads = mapping.resolve_book_ads("The Iron Tide: Book One of the Tidewar Saga");
        assert_eq!(ads, vec!["A1", "A2"]);
        assert!(mapping.resolve_book_ads("Unrelated Title").is_empty());
    }

    #[test]
    fn test_title_matches_is_case_insensitive() {
        assert!(title_matches("SALTMARSH (Kindle Edition)", ["saltmarsh"]));
        assert!(!title_matches("Saltmarsh", ["", "  "]));
    }

    #[test]
    fn test_missing_mapping_fails_fast() {
        let err = load_mapping(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, RoasError::MissingInput { .. }));
    }

    #[test]
    fn test_missing_ad_group_column_is_schema_error() {
        let csv = "FB Ad Name,Book 1\nA1,Title\n";
        assert!(matches!(
            read_mapping(csv.as_bytes(), "mapping.csv"),
            Err(RoasError::Schema { .. })
        ));
    }
}
