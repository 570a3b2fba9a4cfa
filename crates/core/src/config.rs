use crate::error::{RoasError, RoasResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root application configuration. Loaded from an optional TOML file
/// overlaid by environment variables with the prefix `ROAS_TRACKER__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub inputs: InputsConfig,
    #[serde(default)]
    pub outputs: OutputsConfig,
}

/// Constants feeding the ROAS formulas. They must stay fixed for a whole
/// series of windows or the trend comparisons stop being meaningful.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_pages_per_book")]
    pub pages_per_book: f64,
    /// Revenue equivalence of one subscription book read relative to one purchase.
    #[serde(default = "default_kenp_multiplier")]
    pub kenp_multiplier: f64,
    /// Average net profit per e-book sale.
    #[serde(default = "default_profit_per_ebook")]
    pub profit_per_ebook: f64,
    #[serde(default = "default_rolling_window")]
    pub rolling_window: usize,
    #[serde(default = "default_rolling_min_periods")]
    pub rolling_min_periods: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_marketplace")]
    pub marketplace: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputsConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_ad_account_id")]
    pub ad_account_id: String,
    #[serde(default = "default_mapping_path")]
    pub mapping_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputsConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_weekly_summary_file")]
    pub weekly_summary_file: String,
    #[serde(default = "default_ad_summary_file")]
    pub ad_summary_file: String,
    #[serde(default = "default_correlation_file")]
    pub correlation_file: String,
    #[serde(default = "default_correlation_summary_file")]
    pub correlation_summary_file: String,
}

// Default functions
fn default_pages_per_book() -> f64 {
    450.0
}
fn default_kenp_multiplier() -> f64 {
    1.97
}
fn default_profit_per_ebook() -> f64 {
    2.71
}
fn default_rolling_window() -> usize {
    3
}
fn default_rolling_min_periods() -> usize {
    1
}
fn default_marketplace() -> String {
    "Amazon.com".to_string()
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./ad_data")
}
fn default_ad_account_id() -> String {
    "298049981597293".to_string()
}
fn default_mapping_path() -> PathBuf {
    PathBuf::from("./ad_book_mapping.csv")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_weekly_summary_file() -> String {
    "weekly_ad_performance.csv".to_string()
}
fn default_ad_summary_file() -> String {
    "ad_performance_by_ad.csv".to_string()
}
fn default_correlation_file() -> String {
    "ad_book_correlation.csv".to_string()
}
fn default_correlation_summary_file() -> String {
    "ad_book_correlation_summary.csv".to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            pages_per_book: default_pages_per_book(),
            kenp_multiplier: default_kenp_multiplier(),
            profit_per_ebook: default_profit_per_ebook(),
            rolling_window: default_rolling_window(),
            rolling_min_periods: default_rolling_min_periods(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            marketplace: default_marketplace(),
        }
    }
}

impl Default for InputsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            ad_account_id: default_ad_account_id(),
            mapping_path: default_mapping_path(),
        }
    }
}

impl Default for OutputsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            weekly_summary_file: default_weekly_summary_file(),
            ad_summary_file: default_ad_summary_file(),
            correlation_file: default_correlation_file(),
            correlation_summary_file: default_correlation_summary_file(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            metrics: MetricsConfig::default(),
            ledger: LedgerConfig::default(),
            inputs: InputsConfig::default(),
            outputs: OutputsConfig::default(),
        }
    }
}

impl OutputsConfig {
    pub fn weekly_summary_path(&self) -> PathBuf {
        self.output_dir.join(&self.weekly_summary_file)
    }

    pub fn ad_summary_path(&self) -> PathBuf {
        self.output_dir.join(&self.ad_summary_file)
    }

    pub fn correlation_path(&self) -> PathBuf {
        self.output_dir.join(&self.correlation_file)
    }

    pub fn correlation_summary_path(&self) -> PathBuf {
        self.output_dir.join(&self.correlation_summary_file)
    }
}

impl MetricsConfig {
    /// Reject constants that would make the ratio or rolling computations ill-defined.
    pub fn validate(&self) -> RoasResult<()> {
        if !(self.pages_per_book.is_finite() && self.pages_per_book > 0.0) {
            return Err(RoasError::Config(format!(
                "pages_per_book must be a positive number, got {}",
                self.pages_per_book
            )));
        }
        for (name, value) in [
            ("kenp_multiplier", self.kenp_multiplier),
            ("profit_per_ebook", self.profit_per_ebook),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(RoasError::Config(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if self.rolling_window == 0 {
            return Err(RoasError::Config("rolling_window must be at least 1".into()));
        }
        if self.rolling_min_periods == 0 || self.rolling_min_periods > self.rolling_window {
            return Err(RoasError::Config(format!(
                "rolling_min_periods must be between 1 and {}, got {}",
                self.rolling_window, self.rolling_min_periods
            )));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from an optional TOML file and environment variables.
    pub fn load(file: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("ROAS_TRACKER")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    pub fn validate(&self) -> RoasResult<()> {
        self.metrics.validate()?;
        if self.ledger.marketplace.trim().is_empty() {
            return Err(RoasError::Config("ledger.marketplace must not be empty".into()));
        }
        Ok(())
    }
}
