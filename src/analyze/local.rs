use async_trait::async_trait;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{info, warn};

use super::analyze::{Backend, TableIdentifier};
use super::error::{AnalyzeError, AnalyzeResult, MetricError, MetricStage};
use super::history::HistorySummary;
use super::inventory::{stat_tracked_files, FileInventory, FolderScan};
use super::metrics::TableMetrics;
use super::options::AnalysisOptions;
use super::skew::SkewMetrics;
use super::table_analyzer::{log_stage, recover, recover_with, TableAnalyzer};
use crate::reader::{TableHandle, TableReader};
use crate::storage::StorageProvider;

/// Measures a table by reading its transaction log and walking its files.
pub struct LocalAnalyzer {
    storage_provider: Arc<dyn StorageProvider>,
    table_reader: Arc<dyn TableReader>,
}

impl LocalAnalyzer {
    pub fn new(
        storage_provider: Arc<dyn StorageProvider>,
        table_reader: Arc<dyn TableReader>,
    ) -> Self {
        Self {
            storage_provider,
            table_reader,
        }
    }

    async fn partition_skew(
        handle: &dyn TableHandle,
        partition_columns: &[String],
        options: &AnalysisOptions,
    ) -> Result<SkewMetrics, MetricError> {
        let snapshot = handle
            .read_snapshot()
            .await
            .map_err(|e| MetricError::new(MetricStage::Skew, e))?;
        let counts = snapshot
            .partition_row_counts(partition_columns)
            .map_err(|e| MetricError::new(MetricStage::Skew, e))?;
        SkewMetrics::compute(partition_columns, &counts, options.skew_threshold)
            .map_err(|e| MetricError::new(MetricStage::Skew, e))
    }

    async fn folder_scan(&self, location: &str) -> Result<FolderScan, MetricError> {
        FolderScan::walk(self.storage_provider.as_ref(), location)
            .await
            .map_err(|e| MetricError::new(MetricStage::FolderSize, e))
    }

    async fn record_count(handle: &dyn TableHandle) -> Result<u64, MetricError> {
        let snapshot = handle
            .read_snapshot()
            .await
            .map_err(|e| MetricError::new(MetricStage::RecordCount, e))?;
        snapshot
            .num_rows()
            .map_err(|e| MetricError::new(MetricStage::RecordCount, e))
    }

    async fn file_inventory(
        &self,
        handle: &dyn TableHandle,
        folder: &FolderScan,
        options: &AnalysisOptions,
    ) -> Result<FileInventory, MetricError> {
        let file_uris = handle
            .file_uris()
            .await
            .map_err(|e| MetricError::new(MetricStage::FileInventory, e))?;
        let tracked = stat_tracked_files(
            Arc::clone(&self.storage_provider),
            file_uris,
            options.parallelism,
        )
        .await;
        let inventory = FileInventory::reconcile(&tracked, folder, options);
        if !inventory.file_errors.is_empty() {
            warn!(
                "Could not read size of count={} tracked files, table={}, first={:?}",
                inventory.file_errors.len(),
                handle.table_uri(),
                inventory.file_errors.keys().next()
            );
        }
        Ok(inventory)
    }
}

#[async_trait]
impl TableAnalyzer for LocalAnalyzer {
    fn backend(&self) -> Backend {
        Backend::Local
    }

    async fn analyze_table(
        &self,
        table: &TableIdentifier,
        options: &AnalysisOptions,
    ) -> AnalyzeResult<TableMetrics> {
        let location = match table {
            TableIdentifier::Path(path) => path.as_str(),
            TableIdentifier::Name(name) => {
                return Err(AnalyzeError::config(format!(
                    "the local backend needs a table path, got catalog name '{}'",
                    name
                )))
            }
        };
        options.validate()?;

        let open_start = SystemTime::now();
        let handle = self.table_reader.open(location).await?;
        if handle.kind() != Backend::Local {
            return Err(AnalyzeError::BackendTypeMismatch {
                expected: Backend::Local,
                found: handle.kind(),
            });
        }
        let table_uri = handle.table_uri();
        let partition_columns = handle.partition_columns().to_vec();
        info!(
            "Opened table={}, partition_columns={:?}, took={}",
            table_uri,
            partition_columns,
            open_start.elapsed().unwrap_or_default().as_millis()
        );

        let history_start = SystemTime::now();
        let history = HistorySummary::from_entries(&handle.history().await?);
        info!(
            "Read history, table={}, version_count={}, writes={}, deletes={}, optimizes={}, took={}",
            table_uri,
            history.version_count,
            history.number_of_writes,
            history.number_of_deletes,
            history.number_of_optimizes,
            history_start.elapsed().unwrap_or_default().as_millis()
        );
        let mut builder = TableMetrics::builder(table_uri.clone()).history(history);

        if !partition_columns.is_empty() {
            let skew_start = SystemTime::now();
            let skew = recover_with(
                Self::partition_skew(handle.as_ref(), &partition_columns, options).await,
                |e| SkewMetrics::failed(&partition_columns, e),
            );
            builder = builder.skew(skew);
            log_stage("skew", &table_uri, skew_start);
        }

        let folder_start = SystemTime::now();
        let folder = recover(self.folder_scan(location).await);
        builder = builder.folder(folder.folder_size_bytes, folder.file_count() as u64);
        log_stage("folder_size", &table_uri, folder_start);

        let record_count_start = SystemTime::now();
        builder = builder.record_count(recover(Self::record_count(handle.as_ref()).await));
        log_stage("record_count", &table_uri, record_count_start);

        let inventory_start = SystemTime::now();
        let inventory = recover(self.file_inventory(handle.as_ref(), &folder, options).await);
        builder = builder.inventory(inventory);
        log_stage("file_inventory", &table_uri, inventory_start);

        Ok(builder.build())
    }
}
