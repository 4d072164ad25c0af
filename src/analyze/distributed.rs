use async_trait::async_trait;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::info;

use super::analyze::{Backend, TableIdentifier};
use super::error::{AnalyzeResult, MetricError, MetricStage};
use super::history::HistorySummary;
use super::inventory::FileInventory;
use super::metrics::TableMetrics;
use super::options::{AnalysisOptions, DistributedHeuristics};
use super::skew::SkewMetrics;
use super::table_analyzer::{log_stage, recover, recover_with, TableAnalyzer};
use crate::reader::engine::{EngineTable, SqlSession, TableDetail};

/// Measures a table through a query engine's catalog and SQL surface.
///
/// The engine reports sizes only for the live snapshot, so folder size equals
/// table size and orphan files cannot be observed. Vacuum, orphan and
/// small-file facts are estimated with [`DistributedHeuristics`].
pub struct DistributedAnalyzer {
    session: Arc<dyn SqlSession>,
    heuristics: DistributedHeuristics,
}

impl DistributedAnalyzer {
    pub fn new(session: Arc<dyn SqlSession>, heuristics: DistributedHeuristics) -> Self {
        Self {
            session,
            heuristics,
        }
    }

    async fn partition_skew(
        table: &EngineTable,
        partition_columns: &[String],
        options: &AnalysisOptions,
    ) -> Result<SkewMetrics, MetricError> {
        let counts = table
            .partition_counts(partition_columns)
            .await
            .map_err(|e| MetricError::new(MetricStage::Skew, e))?;
        SkewMetrics::compute(partition_columns, &counts, options.skew_threshold)
            .map_err(|e| MetricError::new(MetricStage::Skew, e))
    }
}

/// Estimate the file inventory from table-level totals and maintenance history.
pub fn estimate_inventory(
    heuristics: &DistributedHeuristics,
    detail: &TableDetail,
    history: &HistorySummary,
    options: &AnalysisOptions,
) -> FileInventory {
    let writes = history.number_of_writes;
    let files = detail.num_files;
    let fraction_of_files = |fraction: f64| (files as f64 * fraction).floor() as u64;

    let needs_vacuum = writes > 0
        && writes
            > heuristics
                .vacuum_write_optimize_ratio
                .saturating_mul(history.number_of_optimizes);
    let files_needing_vacuum = if needs_vacuum {
        fraction_of_files(heuristics.vacuum_file_fraction)
    } else {
        0
    };

    let (avg_file_size_bytes, small_files_count, needs_optimize) =
        if files > 0 && detail.size_in_bytes > 0 {
            let avg = detail.size_in_bytes as f64 / files as f64;
            let cutoff = options.small_file_threshold_bytes().unwrap_or(avg);
            if avg < cutoff {
                (avg, fraction_of_files(heuristics.small_band_fraction), true)
            } else if avg < cutoff * 2.0 {
                let small = fraction_of_files(heuristics.medium_band_fraction);
                let needs_optimize = small as f64 > files as f64 * options.small_file_ratio_threshold;
                (avg, small, needs_optimize)
            } else {
                (avg, fraction_of_files(heuristics.large_band_fraction), false)
            }
        } else {
            (0.0, 0, false)
        };

    FileInventory {
        table_size_bytes: detail.size_in_bytes,
        data_file_count: files,
        avg_file_size_bytes,
        small_files_count,
        orphan_files_count: files_needing_vacuum,
        has_orphan_files: needs_vacuum,
        needs_vacuum,
        needs_optimize,
        files_needing_vacuum,
        file_errors: Default::default(),
    }
}

#[async_trait]
impl TableAnalyzer for DistributedAnalyzer {
    fn backend(&self) -> Backend {
        Backend::Distributed
    }

    async fn analyze_table(
        &self,
        table: &TableIdentifier,
        options: &AnalysisOptions,
    ) -> AnalyzeResult<TableMetrics> {
        options.validate()?;
        let engine_table = EngineTable::new(Arc::clone(&self.session), table);

        let detail_start = SystemTime::now();
        let detail = engine_table.describe_detail().await?;
        info!(
            "Described table={}, location={}, size_in_bytes={}, num_files={}, partition_columns={:?}, took={}",
            engine_table.reference(),
            detail.location,
            detail.size_in_bytes,
            detail.num_files,
            detail.partition_columns,
            detail_start.elapsed().unwrap_or_default().as_millis()
        );
        let table_path = if detail.location.is_empty() {
            engine_table.reference().to_string()
        } else {
            detail.location.clone()
        };

        let history_start = SystemTime::now();
        let history = HistorySummary::from_entries(&engine_table.describe_history().await?);
        log_stage("history", &table_path, history_start);

        let inventory = estimate_inventory(&self.heuristics, &detail, &history, options);
        let mut builder = TableMetrics::builder(table_path.clone()).history(history);

        if !detail.partition_columns.is_empty() {
            let skew_start = SystemTime::now();
            let skew = recover_with(
                Self::partition_skew(&engine_table, &detail.partition_columns, options).await,
                |e| SkewMetrics::failed(&detail.partition_columns, e),
            );
            builder = builder.skew(skew);
            log_stage("skew", &table_path, skew_start);
        }

        builder = builder.folder(detail.size_in_bytes, detail.num_files);

        let record_count_start = SystemTime::now();
        let record_count = recover(
            engine_table
                .record_count()
                .await
                .map_err(|e| MetricError::new(MetricStage::RecordCount, e)),
        );
        builder = builder.record_count(record_count);
        log_stage("record_count", &table_path, record_count_start);

        Ok(builder
            .inventory(inventory)
            .storage_efficiency(self.heuristics.storage_efficiency)
            .build())
    }
}
