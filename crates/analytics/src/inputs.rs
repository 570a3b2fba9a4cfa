//! Input locator — finds a window's weekly extracts by the date-derived
//! naming convention and loads them through the reporting ingest layer.

use chrono::Datelike;
use roas_core::config::InputsConfig;
use roas_core::{AnalysisWindow, RoasError, RoasResult};
use roas_reporting::ingest::{load_ad_performance, load_attribution, load_sales_ledger};
use roas_reporting::{WindowInputs, WindowSource};
use std::path::PathBuf;
use tracing::{error, info};

/// Paths of every extract one window needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowFiles {
    pub performance: PathBuf,
    pub attribution: Vec<PathBuf>,
    pub sales: PathBuf,
    pub reads: PathBuf,
}

/// Files live under `<data_dir>/<YYYY>/<MM>/` for the month the window ends in.
#[derive(Debug, Clone)]
pub struct InputLocator {
    data_dir: PathBuf,
    ad_account_id: String,
}

impl InputLocator {
    pub fn new(config: &InputsConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            ad_account_id: config.ad_account_id.clone(),
        }
    }

    pub fn folder(&self, window: &AnalysisWindow) -> PathBuf {
        let end = window.end();
        self.data_dir
            .join(end.year().to_string())
            .join(format!("{:02}", end.month()))
    }

    pub fn performance_path(&self, window: &AnalysisWindow) -> PathBuf {
        self.folder(window).join(format!(
            "{}-Ads_{}.csv",
            self.ad_account_id,
            window.file_stem()
        ))
    }

    pub fn attribution_pattern(&self, window: &AnalysisWindow) -> String {
        let folder = glob::Pattern::escape(&self.folder(window).to_string_lossy());
        format!(
            "{folder}/Amazon_Attribution_campaign_adgroups_*_{}.csv",
            window.file_stem()
        )
    }

    pub fn sales_paths(&self, window: &AnalysisWindow) -> (PathBuf, PathBuf) {
        let stem = format!("KDP_Royalties_Estimator_{}", window.file_stem());
        let folder = self.folder(window);
        (
            folder.join(format!("{stem}_combined_sales.csv")),
            folder.join(format!("{stem}_kenp_reads.csv")),
        )
    }

    /// Resolve every input, reporting all missing paths in a single error.
    pub fn locate(&self, window: &AnalysisWindow) -> RoasResult<WindowFiles> {
        let performance = self.performance_path(window);
        let (sales, reads) = self.sales_paths(window);
        let pattern = self.attribution_pattern(window);

        info!(
            performance = %performance.display(),
            attribution = %pattern,
            sales = %sales.display(),
            "Looking for window inputs"
        );

        let mut attribution: Vec<PathBuf> = glob::glob(&pattern)
            .map_err(|e| RoasError::Config(format!("invalid attribution pattern '{pattern}': {e}")))?
            .filter_map(Result::ok)
            .collect();
        attribution.sort();

        let mut missing: Vec<PathBuf> = [&performance, &sales, &reads]
            .into_iter()
            .filter(|p| !p.exists())
            .cloned()
            .collect();
        if attribution.is_empty() {
            missing.push(PathBuf::from(&pattern));
        }

        if !missing.is_empty() {
            for path in &missing {
                error!(path = %path.display(), "Required input not found");
            }
            return Err(RoasError::MissingInput { paths: missing });
        }

        Ok(WindowFiles {
            performance,
            attribution,
            sales,
            reads,
        })
    }
}

impl WindowSource for InputLocator {
    fn load(&self, window: &AnalysisWindow) -> RoasResult<WindowInputs> {
        let files = self.locate(window)?;
        load_window_files(*window, &files)
    }
}

pub fn load_window_files(window: AnalysisWindow, files: &WindowFiles) -> RoasResult<WindowInputs> {
    Ok(WindowInputs {
        window,
        performance: load_ad_performance(&files.performance)?,
        attribution: load_attribution(&files.attribution)?,
        ledger: load_sales_ledger(&files.sales, &files.reads)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn window() -> AnalysisWindow {
        "2024-12-28:2025-01-04".parse().unwrap()
    }

    fn locator(dir: &Path) -> InputLocator {
        InputLocator::new(&InputsConfig {
            data_dir: dir.to_path_buf(),
            ad_account_id: "123".to_string(),
            mapping_path: dir.join("mapping.csv"),
        })
    }

    #[test]
    fn test_folder_uses_window_end_month() {
        let locator = locator(Path::new("/data"));
        assert_eq!(locator.folder(&window()), PathBuf::from("/data/2025/01"));
        assert_eq!(
            locator.performance_path(&window()),
            PathBuf::from("/data/2025/01/123-Ads_2024-12-28_to_2025-01-04.csv")
        );
    }

    #[test]
    fn test_reports_every_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        match locator(dir.path()).locate(&window()).unwrap_err() {
            RoasError::MissingInput { paths } => assert_eq!(paths.len(), 4),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_locates_multiple_attribution_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let locator = locator(dir.path());
        let folder = locator.folder(&window());
        fs::create_dir_all(&folder).unwrap();
        let stem = window().file_stem();
        for name in [
            format!("123-Ads_{stem}.csv"),
            format!("Amazon_Attribution_campaign_adgroups_profileA_{stem}.csv"),
            format!("Amazon_Attribution_campaign_adgroups_profileB_{stem}.csv"),
            format!("KDP_Royalties_Estimator_{stem}_combined_sales.csv"),
            format!("KDP_Royalties_Estimator_{stem}_kenp_reads.csv"),
        ] {
            fs::write(folder.join(name), "").unwrap();
        }

        let files = locator.locate(&window()).unwrap();
        assert_eq!(files.attribution.len(), 2);
        assert!(files.attribution[0].to_string_lossy().contains("profileA"));
    }
}
