pub mod analyze;
pub mod reader;
pub mod storage;
pub mod util;

pub use analyze::{
    AnalysisOptions, Analyzer, Backend, HealthResult, HealthStatus, TableIdentifier, TableMetrics,
};
pub use storage::StorageConfig;
