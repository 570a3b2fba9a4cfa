pub mod config;
pub mod error;
pub mod types;
pub mod window;

pub use config::AppConfig;
pub use error::{RoasError, RoasResult};
pub use window::{AnalysisWindow, WindowBatch};
