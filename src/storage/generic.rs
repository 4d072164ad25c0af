use async_trait::async_trait;
use futures::TryStreamExt;
use object_store::{ObjectMeta, ObjectStore};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::config::StorageConfig;
use super::error::{StorageError, StorageResult};
use super::provider::{join_path, string_to_path, FileMetadata, StorageProvider};
use crate::util::retry::retry_with_max_retries;

/// A [`StorageProvider`] backed by any object_store implementation.
///
/// The concrete store is picked from the configured URL scheme (`file`, `s3`,
/// `az`/`abfss`, `gs`) through `object_store::parse_url_opts`.
pub struct GenericStorageProvider {
    store: Arc<dyn ObjectStore>,
    prefix: String,
    base_url: String,
    options: HashMap<String, String>,
    max_retries: usize,
}

impl GenericStorageProvider {
    pub async fn new(config: StorageConfig) -> StorageResult<Self> {
        let url = config.base_url()?;
        let clean_options = config.clean_options();
        let max_retries = config.max_retries()?;
        let (store, prefix) = object_store::parse_url_opts(&url, clean_options.clone())?;

        info!(
            "Created storage provider, backend={:?}, url={}, prefix={}",
            config.backend,
            url,
            prefix
        );

        Ok(Self {
            store: Arc::from(store),
            prefix: prefix.as_ref().to_string(),
            base_url: with_trailing_slash(url.as_str()),
            options: clean_options,
            max_retries,
        })
    }

    /// Wrap an already built object store, mostly useful with
    /// `object_store::memory::InMemory`.
    pub fn from_store(store: Arc<dyn ObjectStore>, base_url: &str) -> Self {
        Self {
            store,
            prefix: String::new(),
            base_url: with_trailing_slash(base_url),
            options: HashMap::new(),
            max_retries: 0,
        }
    }

    fn location(&self, path: &str) -> object_store::path::Path {
        string_to_path(&join_path(&self.prefix, path))
    }

    fn to_file_metadata(&self, meta: ObjectMeta) -> FileMetadata {
        let full = meta.location.as_ref();
        let relative = full
            .strip_prefix(self.prefix.as_str())
            .unwrap_or(full)
            .trim_start_matches('/')
            .to_string();
        FileMetadata {
            path: relative,
            size: meta.size as u64,
            last_modified: Some(meta.last_modified),
        }
    }
}

fn with_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}

#[async_trait]
impl StorageProvider for GenericStorageProvider {
    fn base_path(&self) -> &str {
        &self.prefix
    }

    async fn list_files(&self, path: &str, recursive: bool) -> StorageResult<Vec<FileMetadata>> {
        let location = self.location(path);
        let objects: Vec<ObjectMeta> = if recursive {
            self.store.list(Some(&location)).try_collect().await?
        } else {
            self.store.list_with_delimiter(Some(&location)).await?.objects
        };
        debug!(
            "Listed location={}, recursive={}, count={}",
            location,
            recursive,
            objects.len()
        );
        Ok(objects
            .into_iter()
            .map(|meta| self.to_file_metadata(meta))
            .collect())
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        let location = self.location(path);
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => {
                // Directories have no object of their own.
                let listing = self.store.list_with_delimiter(Some(&location)).await?;
                Ok(!listing.objects.is_empty() || !listing.common_prefixes.is_empty())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_metadata(&self, path: &str) -> StorageResult<FileMetadata> {
        let location = self.location(path);
        let store = Arc::clone(&self.store);
        let meta = retry_with_max_retries(self.max_retries, "get_metadata", || {
            let store = Arc::clone(&store);
            let location = location.clone();
            async move { store.head(&location).await }
        })
        .await
        .map_err(|e| match e {
            object_store::Error::NotFound { path, .. } => StorageError::NotFound(path),
            e => StorageError::from(e),
        })?;
        Ok(self.to_file_metadata(meta))
    }

    fn url_from_path(&self, path: &str) -> String {
        let path = path.trim_matches('/');
        if !path.is_empty() {
            return format!("{}{}", self.base_url, path);
        }
        match self.base_url.trim_end_matches('/') {
            root if root.ends_with(':') => self.base_url.clone(),
            base => base.to_string(),
        }
    }

    fn clean_options(&self) -> HashMap<String, String> {
        self.options.clone()
    }
}
