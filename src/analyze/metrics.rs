use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use std::fmt::{Display, Formatter, Result as FmtResult};

use super::constants::{BYTES_PER_MB, IDEAL_FILE_SIZE_BYTES};
use super::history::HistorySummary;
use super::inventory::FileInventory;
use super::scoring::HealthScoreBreakdown;
use super::skew::SkewMetrics;
use crate::reader::delta::DeltaMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    VeryUnhealthy,
    /// Scoring never ran
    Unknown,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "HEALTHY",
            HealthStatus::Unhealthy => "UNHEALTHY",
            HealthStatus::VeryUnhealthy => "VERY_UNHEALTHY",
            HealthStatus::Unknown => "UNKNOWN",
        }
    }
}

impl Display for HealthStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Score and status, always set as a pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthVerdict {
    #[serde(rename = "health_score")]
    pub score: f64,
    #[serde(rename = "health_status")]
    pub status: HealthStatus,
}

/// Operator action suggested by a set of metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    RunVacuum,
    RunOptimize,
    RebalancePartitions,
    CleanOrphanFiles,
}

impl Display for Recommendation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let text = match self {
            Recommendation::RunVacuum => "RUN VACUUM",
            Recommendation::RunOptimize => "RUN OPTIMIZE",
            Recommendation::RebalancePartitions => "REBALANCE PARTITIONS",
            Recommendation::CleanOrphanFiles => "CLEAN ORPHAN FILES",
        };
        f.write_str(text)
    }
}

/// Small-file count above which optimize is recommended regardless of ratio.
const RECOMMEND_OPTIMIZE_SMALL_FILES: u64 = 10;

/// Health-relevant measurements of one table, as produced by one analysis run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableMetrics {
    pub table_path: String,

    // History
    pub version_count: i64,
    pub number_of_writes: u64,
    pub number_of_merges: u64,
    pub number_of_deletes: u64,
    pub number_of_optimizes: u64,
    pub operation_history: Vec<DeltaMetrics>,

    // Rows and partitions
    pub record_count: u64,
    pub partition_count: u64,

    // Files
    pub table_size_bytes: u64,
    pub folder_size_bytes: u64,
    pub total_file_count: u64,
    pub data_file_count: u64,
    pub small_files_count: u64,
    pub avg_file_size_bytes: f64,
    pub orphan_files_count: u64,
    /// `table_size_bytes / folder_size_bytes`, absent for an empty folder
    pub storage_efficiency: Option<f64>,
    /// Average file size relative to 128 MiB, capped at 1
    pub file_size_efficiency: Option<f64>,

    // Skew
    pub skewness_max: f64,
    pub skewness_average: f64,
    pub is_skewed: bool,
    /// Same as `skewness_max` for partitioned tables
    pub partition_skewness: Option<f64>,
    pub skew_metrics: Option<SkewMetrics>,

    // Maintenance flags
    pub needs_vacuum: bool,
    pub has_orphan_files: bool,
    pub needs_optimize: bool,
    pub files_needing_vacuum: u64,

    #[serde(flatten)]
    verdict: Option<HealthVerdict>,
}

impl TableMetrics {
    pub fn builder(table_path: impl Into<String>) -> TableMetricsBuilder {
        TableMetricsBuilder::new(table_path)
    }

    pub fn health_score(&self) -> Option<f64> {
        self.verdict.map(|v| v.score)
    }

    pub fn health_status(&self) -> Option<HealthStatus> {
        self.verdict.map(|v| v.status)
    }

    pub fn verdict(&self) -> Option<HealthVerdict> {
        self.verdict
    }

    pub fn score_breakdown(&self) -> HealthScoreBreakdown {
        HealthScoreBreakdown::compute(self)
    }

    /// Score the table and record the verdict. Calling it again gives the same result.
    pub fn calculate_health_score(&mut self) -> (f64, HealthStatus) {
        let breakdown = self.score_breakdown();
        let verdict = HealthVerdict {
            score: breakdown.overall,
            status: breakdown.status(),
        };
        self.verdict = Some(verdict);
        (verdict.score, verdict.status)
    }

    pub fn recommendations(&self) -> Vec<Recommendation> {
        let mut recommendations = Vec::new();
        if self.needs_vacuum || self.files_needing_vacuum > 0 {
            recommendations.push(Recommendation::RunVacuum);
        }
        if self.needs_optimize || self.small_files_count > RECOMMEND_OPTIMIZE_SMALL_FILES {
            recommendations.push(Recommendation::RunOptimize);
        }
        if self.is_skewed {
            recommendations.push(Recommendation::RebalancePartitions);
        }
        if self.has_orphan_files {
            recommendations.push(Recommendation::CleanOrphanFiles);
        }
        recommendations
    }

    /// Pretty JSON. With `exclude_partitions` the per-partition row counts are left out.
    pub fn to_json(&self, exclude_partitions: bool) -> Result<String, JsonError> {
        if exclude_partitions {
            let mut metrics = self.clone();
            if let Some(skew) = metrics.skew_metrics.as_mut() {
                skew.records_per_partition_dict.clear();
            }
            serde_json::to_string_pretty(&metrics)
        } else {
            serde_json::to_string_pretty(self)
        }
    }
}

fn format_mb(bytes: f64) -> String {
    format!("{:.2} MB", bytes / BYTES_PER_MB)
}

impl Display for TableMetrics {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        writeln!(f, "\n{}", "=".repeat(60))?;
        writeln!(f, "Delta Table Health Report: {}", self.table_path)?;
        writeln!(f, "{}\n", "=".repeat(60))?;

        match self.verdict {
            Some(verdict) => {
                let health_emoji = match verdict.status {
                    HealthStatus::Healthy => "🟢",
                    HealthStatus::Unhealthy => "🟡",
                    _ => "🔴",
                };
                writeln!(
                    f,
                    "{} Health Score: {:.1}/100 ({})",
                    health_emoji, verdict.score, verdict.status
                )?;
            }
            None => writeln!(f, "⚪ Health Score: n/a ({})", HealthStatus::Unknown)?,
        }

        writeln!(f, "\n📜 History:")?;
        writeln!(f, "{}", "─".repeat(60))?;
        writeln!(f, "  Version Count:       {}", self.version_count)?;
        writeln!(f, "  Record Count:        {}", self.record_count)?;
        writeln!(
            f,
            "  Operations:          {} writes, {} merges, {} deletes, {} optimizes",
            self.number_of_writes,
            self.number_of_merges,
            self.number_of_deletes,
            self.number_of_optimizes
        )?;

        writeln!(f, "\n📊 Partition Skew:")?;
        writeln!(f, "{}", "─".repeat(60))?;
        writeln!(
            f,
            "  Skewness:            {:.2} (max), {:.2} (avg)",
            self.skewness_max, self.skewness_average
        )?;
        writeln!(f, "  Skewed:              {}", self.is_skewed)?;
        if let Some(ref skew) = self.skew_metrics {
            writeln!(
                f,
                "  Partition Columns:   {}",
                skew.partition_columns.join(", ")
            )?;
            writeln!(f, "  Partition Count:     {}", skew.partition_count())?;
            if let Some(((max_key, max_count), (min_key, min_count))) = skew.extremes() {
                writeln!(
                    f,
                    "  Max Records:         {} (partition: {})",
                    max_count, max_key
                )?;
                writeln!(
                    f,
                    "  Min Records:         {} (partition: {})",
                    min_count, min_key
                )?;
            }
            if let Some(ref error) = skew.error {
                writeln!(f, "  ⚠️  {}", error)?;
            }
        }

        writeln!(f, "\n📦 Files:")?;
        writeln!(f, "{}", "─".repeat(60))?;
        writeln!(
            f,
            "  Table Size:          {}",
            format_mb(self.table_size_bytes as f64)
        )?;
        writeln!(
            f,
            "  Folder Size:         {}",
            format_mb(self.folder_size_bytes as f64)
        )?;
        writeln!(f, "  Total Files:         {}", self.total_file_count)?;
        writeln!(f, "  Data Files:          {}", self.data_file_count)?;
        writeln!(f, "  Small Files:         {}", self.small_files_count)?;
        writeln!(f, "  Orphan Files:        {}", self.orphan_files_count)?;
        writeln!(
            f,
            "  Average File Size:   {}",
            format_mb(self.avg_file_size_bytes)
        )?;
        if let Some(efficiency) = self.storage_efficiency {
            writeln!(f, "  Storage Efficiency:  {:.1}%", efficiency * 100.0)?;
        }
        if let Some(efficiency) = self.file_size_efficiency {
            writeln!(f, "  File Size Efficiency: {:.1}%", efficiency * 100.0)?;
        }

        writeln!(f, "\n🔧 Maintenance:")?;
        writeln!(f, "{}", "─".repeat(60))?;
        writeln!(f, "  Needs Vacuum:        {}", self.needs_vacuum)?;
        writeln!(f, "  Files Needing Vacuum: {}", self.files_needing_vacuum)?;
        writeln!(f, "  Has Orphan Files:    {}", self.has_orphan_files)?;
        writeln!(f, "  Needs Optimize:      {}", self.needs_optimize)?;

        let recommendations = self.recommendations();
        if !recommendations.is_empty() {
            writeln!(f, "\n💡 Recommendations:")?;
            writeln!(f, "{}", "─".repeat(60))?;
            for (i, recommendation) in recommendations.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, recommendation)?;
            }
        }

        writeln!(f, "\n{}\n", "=".repeat(60))
    }
}

/// Score, status and metrics in one value, for callers that want an integer score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResult {
    pub health_metric: i64,
    pub health_status: HealthStatus,
    pub metrics: TableMetrics,
}

impl From<TableMetrics> for HealthResult {
    fn from(metrics: TableMetrics) -> Self {
        let (health_metric, health_status) = match metrics.verdict() {
            Some(verdict) => (verdict.score.round() as i64, verdict.status),
            None => (0, HealthStatus::Unknown),
        };
        Self {
            health_metric,
            health_status,
            metrics,
        }
    }
}

/// Assembles [`TableMetrics`] from per-stage results, in stage order.
#[derive(Debug, Clone)]
pub struct TableMetricsBuilder {
    metrics: TableMetrics,
    storage_efficiency: Option<f64>,
}

impl TableMetricsBuilder {
    pub fn new(table_path: impl Into<String>) -> Self {
        Self {
            metrics: TableMetrics {
                table_path: table_path.into(),
                ..TableMetrics::default()
            },
            storage_efficiency: None,
        }
    }

    pub fn history(mut self, history: HistorySummary) -> Self {
        let m = &mut self.metrics;
        m.version_count = history.version_count;
        m.number_of_writes = history.number_of_writes;
        m.number_of_merges = history.number_of_merges;
        m.number_of_deletes = history.number_of_deletes;
        m.number_of_optimizes = history.number_of_optimizes;
        m.operation_history = history.operations;
        self
    }

    /// Skew of a partitioned table. Unpartitioned tables skip this stage.
    pub fn skew(mut self, skew: SkewMetrics) -> Self {
        let m = &mut self.metrics;
        m.skewness_max = skew.skewness_max;
        m.skewness_average = skew.skewness_average;
        m.is_skewed = skew.is_skewed;
        m.partition_skewness = Some(skew.skewness_max);
        m.partition_count = skew.partition_count() as u64;
        m.skew_metrics = Some(skew);
        self
    }

    pub fn folder(mut self, folder_size_bytes: u64, total_file_count: u64) -> Self {
        self.metrics.folder_size_bytes = folder_size_bytes;
        self.metrics.total_file_count = total_file_count;
        self
    }

    pub fn record_count(mut self, record_count: u64) -> Self {
        self.metrics.record_count = record_count;
        self
    }

    pub fn inventory(mut self, inventory: FileInventory) -> Self {
        let m = &mut self.metrics;
        m.table_size_bytes = inventory.table_size_bytes;
        m.data_file_count = inventory.data_file_count;
        m.avg_file_size_bytes = inventory.avg_file_size_bytes;
        m.small_files_count = inventory.small_files_count;
        m.orphan_files_count = inventory.orphan_files_count;
        m.has_orphan_files = inventory.has_orphan_files;
        m.needs_vacuum = inventory.needs_vacuum;
        m.needs_optimize = inventory.needs_optimize;
        m.files_needing_vacuum = inventory.files_needing_vacuum;
        self
    }

    /// Report a fixed storage efficiency instead of deriving it from sizes.
    pub fn storage_efficiency(mut self, storage_efficiency: f64) -> Self {
        self.storage_efficiency = Some(storage_efficiency);
        self
    }

    /// Derive the ratios and hand out the metrics, unscored.
    pub fn build(self) -> TableMetrics {
        let mut metrics = self.metrics;
        metrics.storage_efficiency = self.storage_efficiency.or_else(|| {
            (metrics.folder_size_bytes > 0)
                .then(|| metrics.table_size_bytes as f64 / metrics.folder_size_bytes as f64)
        });
        metrics.file_size_efficiency = (metrics.data_file_count > 0
            && metrics.avg_file_size_bytes > 0.0)
            .then(|| (metrics.avg_file_size_bytes / IDEAL_FILE_SIZE_BYTES as f64).min(1.0));
        metrics
    }
}
