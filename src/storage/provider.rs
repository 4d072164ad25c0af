use async_trait::async_trait;
use object_store::path::Path as ObjectPath;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};

use super::error::StorageResult;

/// Metadata about a file in storage
#[derive(Debug, Clone, PartialEq)]
pub struct FileMetadata {
    /// Path to the file, relative to the provider's base path
    pub path: String,

    /// File size in bytes
    pub size: u64,

    /// Last modified timestamp (if available)
    pub last_modified: Option<chrono::DateTime<chrono::Utc>>,
}

impl FileMetadata {
    /// The last path segment, used to match physical files against log entries.
    pub fn file_name(&self) -> &str {
        file_name(&self.path)
    }
}

/// Last segment of a `/`-separated path.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Generic trait for storage providers
///
/// This trait provides a unified interface over the storage a table lives in
/// (AWS S3, Azure Data Lake, GCS, Local filesystem). All paths are relative
/// to [`StorageProvider::base_path`].
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Get the base path/prefix for this storage provider
    fn base_path(&self) -> &str;

    /// List all files at the given path
    ///
    /// # Arguments
    /// * `path` - The path to list files from (relative to base_path)
    /// * `recursive` - Whether to list files recursively
    async fn list_files(&self, path: &str, recursive: bool) -> StorageResult<Vec<FileMetadata>>;

    /// Check if a file or directory exists
    ///
    /// # Arguments
    /// * `path` - The path to check (relative to base_path)
    async fn exists(&self, path: &str) -> StorageResult<bool>;

    /// Get metadata for a specific file
    ///
    /// # Arguments
    /// * `path` - The path to the file (relative to base_path)
    async fn get_metadata(&self, path: &str) -> StorageResult<FileMetadata>;

    /// Get a full provider specific URL for a path
    ///
    /// # Arguments
    /// * `path` - The path
    fn url_from_path(&self, path: &str) -> String;

    /// Credentials and client options to hand to table readers that open
    /// their own object store, without the crate's internal keys.
    fn clean_options(&self) -> HashMap<String, String>;
}

impl Debug for dyn StorageProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "StorageProvider(base_path={})", self.base_path())
    }
}

/// Helper function to create an ObjectPath from a string
pub(crate) fn string_to_path(s: &str) -> ObjectPath {
    ObjectPath::from(s)
}

/// Join a relative path onto a prefix, ignoring empty segments on either side.
pub(crate) fn join_path(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let path = path.trim_matches('/');
    match (prefix.is_empty(), path.is_empty()) {
        (true, _) => path.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{}/{}", prefix, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("day=Mon/part-0001.parquet"), "part-0001.parquet");
        assert_eq!(file_name("part-0001.parquet"), "part-0001.parquet");
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("", "tips"), "tips");
        assert_eq!(join_path("data/", "/tips/"), "data/tips");
        assert_eq!(join_path("data", ""), "data");
    }
}
