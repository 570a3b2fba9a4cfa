//! ROAS Tracker — weekly reconciliation of ad spend, marketplace attribution
//! and publishing royalties.
//!
//! Entry point that loads configuration, locates each window's extracts and
//! folds them through the reporting pipeline.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use roas_analytics::{InputLocator, TableStore};
use roas_core::config::AppConfig;
use roas_core::{AnalysisWindow, WindowBatch};
use roas_reporting::mapping::load_mapping;
use roas_reporting::{Accumulator, Pipeline};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "roas-tracker")]
#[command(about = "Reconcile weekly ad spend with attribution and royalty data")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Root folder holding YYYY/MM extract folders (overrides config)
    #[arg(long, global = true, env = "ROAS_TRACKER__INPUTS__DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Ad-book mapping table (overrides config)
    #[arg(long, global = true, env = "ROAS_TRACKER__INPUTS__MAPPING_PATH")]
    mapping: Option<PathBuf>,

    /// Directory receiving the output tables (overrides config)
    #[arg(long, global = true, env = "ROAS_TRACKER__OUTPUTS__OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Marketplace the ledger is filtered to (overrides config)
    #[arg(long, global = true)]
    marketplace: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    /// Print the correlation summary to stdout as JSON
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process one window, appending to the existing tables
    Run {
        /// Window as START:END (defaults to the last complete Saturday-to-Saturday week)
        #[arg(long)]
        window: Option<String>,
    },
    /// Process a batch of windows in chronological order from fresh tables
    Batch {
        /// Window as START:END; repeatable
        #[arg(long = "window")]
        windows: Vec<String>,

        /// File with one START:END window per line
        #[arg(long)]
        windows_file: Option<PathBuf>,
    },
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "roas_tracker=info,roas_reporting=info,roas_analytics=info".into()
    });
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) if cli.config.is_some() => {
            return Err(e).context("Failed to load configuration file");
        }
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            AppConfig::default()
        }
    };

    // Apply CLI overrides
    if let Some(dir) = &cli.data_dir {
        config.inputs.data_dir = dir.clone();
    }
    if let Some(path) = &cli.mapping {
        config.inputs.mapping_path = path.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.outputs.output_dir = dir.clone();
    }
    if let Some(marketplace) = &cli.marketplace {
        config.ledger.marketplace = marketplace.clone();
    }

    config.validate()?;
    Ok(config)
}

fn collect_window_args(windows: &[String], windows_file: Option<&PathBuf>) -> anyhow::Result<Vec<String>> {
    let mut raw_windows = windows.to_vec();
    if let Some(path) = windows_file {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read windows file {}", path.display()))?;
        raw_windows.extend(
            contents
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(str::to_string),
        );
    }
    Ok(raw_windows)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    info!("ROAS tracker starting up");

    let config = load_config(&cli)?;
    info!(
        data_dir = %config.inputs.data_dir.display(),
        mapping = %config.inputs.mapping_path.display(),
        output_dir = %config.outputs.output_dir.display(),
        marketplace = %config.ledger.marketplace,
        pages_per_book = config.metrics.pages_per_book,
        kenp_multiplier = config.metrics.kenp_multiplier,
        profit_per_ebook = config.metrics.profit_per_ebook,
        "Configuration loaded"
    );

    let mapping = load_mapping(&config.inputs.mapping_path).context("Ad-book mapping is required")?;
    let pipeline = Pipeline::new(&config, mapping)?;
    let locator = InputLocator::new(&config.inputs);
    let mut store = TableStore::new(&config.outputs);

    let (batch, accumulator) = match &cli.command {
        Command::Run { window } => {
            let window = match window {
                Some(raw) => raw.parse::<AnalysisWindow>()?,
                None => AnalysisWindow::last_complete_week(chrono::Local::now().date_naive()),
            };
            let accumulator = Accumulator::resume(
                &config,
                store.load_ad_rows()?,
                store.load_correlation_rows()?,
            );
            (WindowBatch::single(window), accumulator)
        }
        Command::Batch {
            windows,
            windows_file,
        } => {
            let raw_windows = collect_window_args(windows, windows_file.as_ref())?;
            let batch = WindowBatch::parse_lenient(&raw_windows);
            if batch.is_empty() {
                bail!("No valid windows to process");
            }
            info!(windows = batch.len(), "Starting batch from fresh tables");
            (batch, Accumulator::fresh(&config))
        }
    };

    let accumulator = pipeline.run_batch(&batch, accumulator, &locator, &mut store)?;

    let summaries = accumulator.correlation.summarize();
    store.write_correlation_summary(&summaries)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    }

    info!(windows = batch.len(), "ROAS tracker finished");
    Ok(())
}
