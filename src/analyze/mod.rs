//! Delta table health analysis.
//!
//! An [`Analyzer`] runs one of two backends against a table:
//!
//! - **local**: reads the `_delta_log` and walks the table folder through a
//!   [`StorageProvider`](crate::storage::StorageProvider), so orphan files and
//!   exact file sizes are measured.
//! - **distributed**: asks a query engine (`DESCRIBE DETAIL`, `DESCRIBE HISTORY`,
//!   `GROUP BY` counts) and estimates file-level facts with
//!   [`DistributedHeuristics`].
//!
//! Both produce [`TableMetrics`], which the analyzer scores on four 25-point
//! components (freshness, maintenance, balance, storage).
//!
//! ## Example
//!
//! ```no_run
//! use delta_pulse::analyze::{Analyzer, Backend, TableIdentifier};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let analyzer = Analyzer::builder("local".parse::<Backend>()?).build().await?;
//! let result = analyzer
//!     .analyze_with_health_result(&TableIdentifier::parse("/data/tips"))
//!     .await?;
//! println!("{} ({})", result.health_metric, result.health_status);
//! # Ok(())
//! # }
//! ```

pub mod analyze;
pub mod constants;
pub mod distributed;
pub mod error;
pub mod history;
pub mod inventory;
pub mod local;
pub mod metrics;
pub mod options;
pub mod scoring;
pub mod skew;
pub mod table_analyzer;

pub use analyze::{Analyzer, AnalyzerBuilder, Backend, TableIdentifier};
pub use distributed::DistributedAnalyzer;
pub use error::{AnalyzeError, AnalyzeResult, MetricError, MetricStage};
pub use history::HistorySummary;
pub use inventory::{FileInventory, FolderScan};
pub use local::LocalAnalyzer;
pub use metrics::{
    HealthResult, HealthStatus, HealthVerdict, Recommendation, TableMetrics, TableMetricsBuilder,
};
pub use options::{AnalysisOptions, DistributedHeuristics};
pub use scoring::HealthScoreBreakdown;
pub use skew::{SkewMethod, SkewMetrics};
pub use table_analyzer::TableAnalyzer;
