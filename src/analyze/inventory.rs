//! Reconciles the files the transaction log tracks with the files physically
//! present under the table location.

use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info};

use super::constants::{DATA_FILE_EXTENSION, DELTA_LOG_DIR};
use super::options::AnalysisOptions;
use crate::storage::provider::file_name;
use crate::storage::{FileMetadata, StorageProvider, StorageResult};

/// Whether `path` is a data file rather than transaction log content.
pub fn is_data_file(path: &str) -> bool {
    path.ends_with(DATA_FILE_EXTENSION) && !path.split('/').any(|segment| segment == DELTA_LOG_DIR)
}

/// The physical side: every data file under the table location.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FolderScan {
    pub folder_size_bytes: u64,
    pub present_files: Vec<FileMetadata>,
}

impl FolderScan {
    pub fn from_listing(listing: Vec<FileMetadata>) -> Self {
        let present_files: Vec<FileMetadata> = listing
            .into_iter()
            .filter(|f| is_data_file(&f.path))
            .collect();
        Self {
            folder_size_bytes: present_files.iter().map(|f| f.size).sum(),
            present_files,
        }
    }

    /// Walk `location` recursively through `storage`.
    pub async fn walk(
        storage: &dyn StorageProvider,
        location: &str,
    ) -> StorageResult<Self> {
        let walk_start = SystemTime::now();
        let listing = storage.list_files(location, true).await?;
        let scan = Self::from_listing(listing);
        info!(
            "Walked table folder, location={}, data_files={}, folder_size_bytes={}, took={}",
            location,
            scan.present_files.len(),
            scan.folder_size_bytes,
            walk_start.elapsed().unwrap_or_default().as_millis()
        );
        Ok(scan)
    }

    pub fn file_count(&self) -> usize {
        self.present_files.len()
    }

    pub fn file_names(&self) -> HashSet<&str> {
        self.present_files.iter().map(|f| f.file_name()).collect()
    }
}

/// A tracked file and its size as found in storage.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedFile {
    pub path: String,
    pub size: Option<u64>,
    pub error: Option<String>,
}

/// Stat every tracked file, `parallelism` requests at a time. Failures are
/// kept per file.
pub async fn stat_tracked_files(
    storage: Arc<dyn StorageProvider>,
    paths: Vec<String>,
    parallelism: usize,
) -> Vec<TrackedFile> {
    stream::iter(paths)
        .map(|path| {
            let storage = Arc::clone(&storage);
            async move {
                match storage.get_metadata(&path).await {
                    Ok(meta) => TrackedFile {
                        path,
                        size: Some(meta.size),
                        error: None,
                    },
                    Err(e) => {
                        if e.is_not_found() {
                            debug!("Tracked file={} is missing from storage", path);
                        } else {
                            debug!("Failed to stat tracked file={}, error={}", path, e);
                        }
                        TrackedFile {
                            path,
                            size: None,
                            error: Some(e.to_string()),
                        }
                    }
                }
            }
        })
        .buffered(parallelism.max(1))
        .collect()
        .await
}

/// Size, orphan and small-file facts for the tracked side of a table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileInventory {
    /// Sum of the sizes of tracked files that could be read
    pub table_size_bytes: u64,
    pub data_file_count: u64,
    pub avg_file_size_bytes: f64,
    pub small_files_count: u64,
    pub orphan_files_count: u64,
    pub has_orphan_files: bool,
    pub needs_vacuum: bool,
    pub needs_optimize: bool,
    pub files_needing_vacuum: u64,

    /// Tracked files whose size could not be read, with the reason
    pub file_errors: BTreeMap<String, String>,
}

impl FileInventory {
    pub fn reconcile(
        tracked: &[TrackedFile],
        folder: &FolderScan,
        options: &AnalysisOptions,
    ) -> Self {
        let sizes: Vec<u64> = tracked.iter().filter_map(|f| f.size).collect();
        let table_size_bytes: u64 = sizes.iter().sum();
        let file_errors: BTreeMap<String, String> = tracked
            .iter()
            .filter_map(|f| f.error.clone().map(|e| (f.path.clone(), e)))
            .collect();

        let tracked_names: HashSet<&str> = tracked.iter().map(|f| file_name(&f.path)).collect();
        let orphan_files_count = folder.file_names().difference(&tracked_names).count() as u64;

        let present_count = folder.file_count();
        let has_orphan_files = present_count > 0
            && (tracked.len() as f64 / present_count as f64) < options.orphan_file_ratio_threshold;

        let needs_vacuum = folder.folder_size_bytes > 0
            && (table_size_bytes as f64 / folder.folder_size_bytes as f64)
                < options.vacuum_size_ratio_threshold;

        let (avg_file_size_bytes, small_files_count, needs_optimize) = if sizes.is_empty() {
            (0.0, 0, false)
        } else {
            let avg = table_size_bytes as f64 / sizes.len() as f64;
            let cutoff = options.small_file_threshold_bytes().unwrap_or(avg);
            let small = sizes.iter().filter(|&&size| (size as f64) < cutoff).count() as u64;
            let needs_optimize =
                small as f64 > sizes.len() as f64 * options.small_file_ratio_threshold;
            (avg, small, needs_optimize)
        };

        Self {
            table_size_bytes,
            data_file_count: tracked.len() as u64,
            avg_file_size_bytes,
            small_files_count,
            orphan_files_count,
            has_orphan_files,
            needs_vacuum,
            needs_optimize,
            files_needing_vacuum: if needs_vacuum { orphan_files_count } else { 0 },
            file_errors,
        }
    }
}
