use std::sync::Arc;
use tracing::debug;

use super::config::StorageConfig;
use super::error::StorageResult;
use super::generic::GenericStorageProvider;
use super::provider::StorageProvider;

/// Builds the storage providers table analysis reads through.
pub struct StorageProviderFactory;

impl StorageProviderFactory {
    /// Create a storage provider from a configuration.
    pub async fn from_config(config: StorageConfig) -> StorageResult<Arc<dyn StorageProvider>> {
        let provider = GenericStorageProvider::new(config).await?;
        Ok(Arc::new(provider))
    }

    /// A provider rooted at the filesystem root, so absolute table paths
    /// resolve as given.
    pub async fn filesystem_root() -> StorageResult<Arc<dyn StorageProvider>> {
        debug!("No storage configured, reading tables from the filesystem root");
        Self::from_config(StorageConfig::local().with_option("path", "/")).await
    }
}
