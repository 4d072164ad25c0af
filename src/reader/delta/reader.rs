use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use deltalake::kernel::{Add, CommitInfo};
use deltalake::{DeltaTable, DeltaTableError};
use object_store::path::Path as ObjectPath;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Once};
use std::time::SystemTime;
use tracing::{debug, info};

use crate::analyze::constants::DELTA_LOG_DIR;
use crate::analyze::error::{AnalyzeError, AnalyzeResult};
use crate::analyze::Backend;
use crate::reader::{HistoryEntry, SnapshotFile, SnapshotView, TableHandle, TableReader};
use crate::storage::provider::join_path;
use crate::storage::StorageProvider;

static REGISTER_HANDLERS: Once = Once::new();

/// deltalake resolves cloud URL schemes through handlers registered at runtime.
fn register_cloud_handlers() {
    REGISTER_HANDLERS.call_once(|| {
        deltalake::aws::register_handlers(None);
        deltalake::azure::register_handlers(None);
        deltalake::gcp::register_handlers(None);
    });
}

/// Opens Delta tables through `deltalake`, which replays the `_delta_log`
/// from its latest checkpoint and the JSON commits that follow it.
///
/// ```no_run
/// use delta_pulse::reader::delta::DeltaLogReader;
/// use delta_pulse::reader::TableReader;
/// use delta_pulse::storage::{StorageConfig, StorageProviderFactory};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
/// let config = StorageConfig::local().with_option("path", "/data");
/// let storage = StorageProviderFactory::from_config(config).await?;
/// let table = DeltaLogReader::new(storage).open("tips").await?;
/// println!("partitioned by {:?}", table.partition_columns());
/// # Ok(())
/// # }
/// ```
pub struct DeltaLogReader {
    storage_provider: Arc<dyn StorageProvider>,
}

impl DeltaLogReader {
    pub fn new(storage_provider: Arc<dyn StorageProvider>) -> Self {
        Self { storage_provider }
    }
}

#[async_trait]
impl TableReader for DeltaLogReader {
    async fn open(&self, location: &str) -> AnalyzeResult<Box<dyn TableHandle>> {
        let table = DeltaLogTable::load(Arc::clone(&self.storage_provider), location).await?;
        Ok(Box::new(table))
    }
}

/// A Delta table as of the latest version present at open time.
///
/// File paths are relative to the storage provider, so they can be stated
/// and matched against the folder walk directly.
#[derive(Debug)]
pub struct DeltaLogTable {
    table_uri: String,
    version: i64,
    partition_columns: Vec<String>,
    history: Vec<HistoryEntry>,
    files: BTreeMap<String, SnapshotFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileStats {
    num_records: Option<u64>,
}

fn log_error(table_uri: &str, action: &str, err: DeltaTableError) -> AnalyzeError {
    AnalyzeError::Log(format!(
        "failed to {} Delta table {}: {}",
        action, table_uri, err
    ))
}

impl DeltaLogTable {
    pub async fn load(
        storage_provider: Arc<dyn StorageProvider>,
        location: &str,
    ) -> AnalyzeResult<Self> {
        let load_start = SystemTime::now();
        let table_uri = storage_provider.url_from_path(location);
        let log_dir = join_path(location, DELTA_LOG_DIR);
        if !storage_provider.exists(&log_dir).await? {
            return Err(AnalyzeError::Log(format!(
                "{} is not a Delta table, {} is missing",
                table_uri, DELTA_LOG_DIR
            )));
        }

        register_cloud_handlers();
        let table = deltalake::open_table_with_storage_options(
            table_uri.as_str(),
            storage_provider.clean_options(),
        )
        .await
        .map_err(|e| log_error(&table_uri, "open", e))?;
        let version = table.version();
        debug!(
            "Opened Delta table, table={}, version={}, took={}",
            table_uri,
            version,
            load_start.elapsed().unwrap_or_default().as_millis()
        );

        let partition_columns = table
            .metadata()
            .map_err(|e| log_error(&table_uri, "read metadata of", e))?
            .partition_columns
            .clone();

        let base_url = storage_provider.url_from_path("");
        let files = table
            .snapshot()
            .and_then(|snapshot| snapshot.file_actions())
            .map_err(|e| log_error(&table_uri, "list files of", e))?
            .into_iter()
            .map(|add| {
                let path = Self::resolve_path(&base_url, location, &add.path);
                (path.clone(), Self::snapshot_file(path, add))
            })
            .collect::<BTreeMap<_, _>>();

        let history = Self::load_history(&table, &table_uri, version).await?;

        info!(
            "Loaded delta log, table={}, version={}, commits={}, live_files={}, took={}",
            table_uri,
            version,
            history.len(),
            files.len(),
            load_start.elapsed().unwrap_or_default().as_millis()
        );

        Ok(DeltaLogTable {
            table_uri,
            version,
            partition_columns,
            history,
            files,
        })
    }

    /// Commit infos come back newest first and carry no version of their
    /// own. The commits still on storage are contiguous up to `version`.
    async fn load_history(
        table: &DeltaTable,
        table_uri: &str,
        version: i64,
    ) -> AnalyzeResult<Vec<HistoryEntry>> {
        let commits = table
            .history(None)
            .await
            .map_err(|e| log_error(table_uri, "read history of", e))?;
        let mut history: Vec<HistoryEntry> = commits
            .into_iter()
            .enumerate()
            .map(|(i, commit)| Self::history_entry(version - i as i64, commit))
            .collect();
        history.reverse();
        Ok(history)
    }

    fn history_entry(version: i64, commit: CommitInfo) -> HistoryEntry {
        let CommitInfo {
            operation,
            timestamp,
            operation_parameters,
            mut info,
            ..
        } = commit;
        let operation_metrics = match info.remove("operationMetrics") {
            Some(Value::Object(metrics)) => metrics,
            _ => Map::new(),
        };
        HistoryEntry {
            operation: operation.unwrap_or_default(),
            timestamp: timestamp.and_then(|ts| Utc.timestamp_millis_opt(ts).single()),
            version,
            operation_metrics,
            operation_parameters: operation_parameters
                .map(|params| params.into_iter().collect())
                .unwrap_or_default(),
        }
    }

    fn snapshot_file(path: String, add: Add) -> SnapshotFile {
        let num_records = add
            .stats
            .as_deref()
            .and_then(|s| serde_json::from_str::<FileStats>(s).ok())
            .and_then(|s| s.num_records);
        SnapshotFile {
            path,
            size: add.size.max(0) as u64,
            partition_values: add.partition_values,
            num_records,
        }
    }

    /// Log paths are URL-encoded and relative to the table root. Absolute URIs
    /// under the provider's root are turned back into provider paths; any
    /// other absolute URI is kept as written.
    fn resolve_path(base_url: &str, location: &str, log_path: &str) -> String {
        if log_path.contains("://") {
            return match strip_base_url(base_url, log_path) {
                Some(relative) => decode_path(relative),
                None => log_path.to_string(),
            };
        }
        join_path(location, &decode_path(log_path))
    }

    /// Latest loaded version.
    pub fn version(&self) -> i64 {
        self.version
    }
}

/// The part of `uri` below `base_url`, only when it starts on a segment boundary.
fn strip_base_url<'a>(base_url: &str, uri: &'a str) -> Option<&'a str> {
    let rest = uri.strip_prefix(base_url.trim_end_matches('/'))?;
    if !rest.starts_with('/') {
        return None;
    }
    Some(rest.trim_start_matches('/')).filter(|relative| !relative.is_empty())
}

fn decode_path(path: &str) -> String {
    ObjectPath::from_url_path(path)
        .map(|p| p.as_ref().to_string())
        .unwrap_or_else(|_| path.to_string())
}

#[async_trait]
impl TableHandle for DeltaLogTable {
    fn kind(&self) -> Backend {
        Backend::Local
    }

    fn table_uri(&self) -> String {
        self.table_uri.clone()
    }

    fn partition_columns(&self) -> &[String] {
        &self.partition_columns
    }

    async fn history(&self) -> AnalyzeResult<Vec<HistoryEntry>> {
        Ok(self.history.clone())
    }

    async fn file_uris(&self) -> AnalyzeResult<Vec<String>> {
        Ok(self.files.keys().cloned().collect())
    }

    async fn read_snapshot(&self) -> AnalyzeResult<SnapshotView> {
        Ok(SnapshotView::new(self.files.values().cloned().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{StorageConfig, StorageProviderFactory};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const COMMIT_0: &str = r#"{"commitInfo":{"timestamp":1700000000000,"operation":"WRITE","operationParameters":{"mode":"Overwrite"},"operationMetrics":{"numFiles":"2"}}}
{"protocol":{"minReaderVersion":1,"minWriterVersion":2}}
{"metaData":{"id":"t1","format":{"provider":"parquet","options":{}},"schemaString":"{\"type\":\"struct\",\"fields\":[{\"name\":\"day\",\"type\":\"string\",\"nullable\":true,\"metadata\":{}},{\"name\":\"total_bill\",\"type\":\"double\",\"nullable\":true,\"metadata\":{}}]}","partitionColumns":["day"],"configuration":{},"createdTime":1700000000000}}
{"add":{"path":"day=Mon/part-0.parquet","partitionValues":{"day":"Mon"},"size":1000,"modificationTime":1700000000000,"dataChange":true,"stats":"{\"numRecords\":80}"}}
{"add":{"path":"day=Tue/part-1.parquet","partitionValues":{"day":"Tue"},"size":500,"modificationTime":1700000000000,"dataChange":true,"stats":"{\"numRecords\":20}"}}
"#;

    const COMMIT_1: &str = r#"{"commitInfo":{"timestamp":1700000100000,"operation":"DELETE","operationParameters":{"predicate":"[]"}}}
{"remove":{"path":"day=Tue/part-1.parquet","deletionTimestamp":1700000100000,"dataChange":true}}
{"add":{"path":"day=Tue/part-2%20b.parquet","partitionValues":{"day":"Tue"},"size":300,"modificationTime":1700000100000,"dataChange":true,"stats":"{\"numRecords\":15}"}}
"#;

    const COMMIT_2: &str = r#"{"commitInfo":{"timestamp":1700000200000,"operation":"WRITE","operationParameters":{"mode":"Append"}}}
{"add":{"path":"day=Wed/part-3.parquet","partitionValues":{"day":"Wed"},"size":200,"modificationTime":1700000200000,"dataChange":true,"stats":"{\"numRecords\":5}"}}
"#;

    fn write_commit(root: &Path, version: i64, content: &str) {
        let log_dir = root.join("tips/_delta_log");
        fs::create_dir_all(&log_dir).unwrap();
        fs::write(log_dir.join(format!("{:020}.json", version)), content).unwrap();
    }

    async fn storage(dir: &TempDir) -> Arc<dyn StorageProvider> {
        let config = StorageConfig::local().with_option("path", dir.path().to_str().unwrap());
        StorageProviderFactory::from_config(config).await.unwrap()
    }

    #[tokio::test]
    async fn test_loads_files_and_history() {
        let dir = tempfile::tempdir().unwrap();
        write_commit(dir.path(), 0, COMMIT_0);
        write_commit(dir.path(), 1, COMMIT_1);

        let table = DeltaLogTable::load(storage(&dir).await, "tips").await.unwrap();

        assert_eq!(table.version(), 1);
        assert_eq!(table.partition_columns(), &["day".to_string()]);
        assert!(table.table_uri().starts_with("file://"));
        assert!(table.table_uri().ends_with("/tips"));

        let files = table.file_uris().await.unwrap();
        assert_eq!(
            files,
            vec![
                "tips/day=Mon/part-0.parquet".to_string(),
                "tips/day=Tue/part-2 b.parquet".to_string()
            ]
        );

        let history = table.history().await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].operation, "WRITE");
        assert_eq!(history[0].version, 0);
        assert_eq!(history[0].operation_metrics["numFiles"], "2");
        assert_eq!(history[0].operation_parameters["mode"], "Overwrite");
        assert_eq!(history[1].operation, "DELETE");
        assert_eq!(history[1].version, 1);

        let snapshot = table.read_snapshot().await.unwrap();
        assert_eq!(snapshot.num_rows().unwrap(), 95);
    }

    #[tokio::test]
    async fn test_loads_from_checkpoint_without_early_commits() {
        let dir = tempfile::tempdir().unwrap();
        write_commit(dir.path(), 0, COMMIT_0);
        write_commit(dir.path(), 1, COMMIT_1);
        let table_uri = storage(&dir).await.url_from_path("tips");
        let table = deltalake::open_table(table_uri.as_str()).await.unwrap();
        deltalake::checkpoints::create_checkpoint(&table).await.unwrap();
        write_commit(dir.path(), 2, COMMIT_2);
        for version in 0..2 {
            let commit = format!("tips/_delta_log/{:020}.json", version);
            fs::remove_file(dir.path().join(commit)).unwrap();
        }

        let table = DeltaLogTable::load(storage(&dir).await, "tips").await.unwrap();

        assert_eq!(table.version(), 2);
        assert_eq!(table.file_uris().await.unwrap().len(), 3);
        assert_eq!(table.read_snapshot().await.unwrap().num_rows().unwrap(), 100);
        let history = table.history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].version, 2);
        assert_eq!(history[0].operation, "WRITE");
    }

    #[tokio::test]
    async fn test_absolute_add_paths_become_provider_paths() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(&dir).await;
        let absolute = format!("{}/day=Wed/part-9.parquet", storage.url_from_path("tips"));
        write_commit(dir.path(), 0, COMMIT_0);
        write_commit(
            dir.path(),
            1,
            &COMMIT_2.replace("day=Wed/part-3.parquet", &absolute),
        );

        let table = DeltaLogTable::load(storage, "tips").await.unwrap();

        let files = table.file_uris().await.unwrap();
        assert!(files.contains(&"tips/day=Wed/part-9.parquet".to_string()));
        assert!(files.iter().all(|f| !f.contains("://")));
    }

    #[test]
    fn test_resolve_path() {
        let base = "s3://bucket/warehouse";
        assert_eq!(
            DeltaLogTable::resolve_path(base, "tips", "day=Mon/part%200.parquet"),
            "tips/day=Mon/part 0.parquet"
        );
        assert_eq!(
            DeltaLogTable::resolve_path(base, "tips", "s3://bucket/warehouse/tips/a.parquet"),
            "tips/a.parquet"
        );
        assert_eq!(
            DeltaLogTable::resolve_path(base, "tips", "s3://bucket/warehouse2/tips/a.parquet"),
            "s3://bucket/warehouse2/tips/a.parquet"
        );
        assert_eq!(
            DeltaLogTable::resolve_path("file:///", "data/tips", "file:///data/tips/a.parquet"),
            "data/tips/a.parquet"
        );
    }

    #[tokio::test]
    async fn test_missing_log_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("tips")).unwrap();
        fs::write(dir.path().join("tips/part-0.parquet"), "x").unwrap();
        let err = DeltaLogTable::load(storage(&dir).await, "tips")
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzeError::Log(_)));
    }

    #[tokio::test]
    async fn test_malformed_commit_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_commit(dir.path(), 0, "{not json");
        let err = DeltaLogTable::load(storage(&dir).await, "tips")
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzeError::Log(_)));
    }

    #[tokio::test]
    async fn test_reader_hands_out_local_handles() {
        let dir = tempfile::tempdir().unwrap();
        write_commit(dir.path(), 0, COMMIT_0);
        let handle = DeltaLogReader::new(storage(&dir).await)
            .open("tips")
            .await
            .unwrap();
        assert_eq!(handle.kind(), Backend::Local);
    }
}
