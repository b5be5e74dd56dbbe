pub mod aggregator;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod report;

pub use aggregator::analyze;
pub use config::{AnalysisConfig, LevelThresholds};
pub use error::{AnalysisError, AnalysisResult};
