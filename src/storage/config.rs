use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use url::Url;

use super::error::{StorageError, StorageResult};

/// Prefix for options consumed by this crate rather than by object_store.
pub const INTERNAL_OPTION_PREFIX: &str = "pulse.";

/// Option holding the maximum number of retries for transient storage errors.
pub const MAX_RETRIES_OPTION: &str = "pulse.max_retries";

const DEFAULT_MAX_RETRIES: usize = 3;

/// The kind of storage a table lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    Aws,
    Azure,
    Gcp,
}

/// Storage configuration used to build a [`StorageProvider`](super::StorageProvider).
///
/// Local storage takes its root directory from the `path` option, cloud
/// storage takes a `url` option (`s3://bucket/prefix`, `az://container/prefix`,
/// `gs://bucket/prefix`). All remaining options, apart from the `pulse.*`
/// ones, are passed through to object_store untouched.
///
/// ```
/// use delta_pulse::storage::StorageConfig;
///
/// let config = StorageConfig::aws()
///     .with_option("url", "s3://my-bucket/warehouse")
///     .with_option("aws_region", "eu-west-1");
/// assert_eq!(config.option("aws_region"), Some("eu-west-1"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    #[serde(default)]
    pub options: HashMap<String, String>,
}

impl StorageConfig {
    pub fn new(backend: StorageBackend) -> Self {
        Self {
            backend,
            options: HashMap::new(),
        }
    }

    pub fn local() -> Self {
        Self::new(StorageBackend::Local)
    }

    pub fn aws() -> Self {
        Self::new(StorageBackend::Aws)
    }

    pub fn azure() -> Self {
        Self::new(StorageBackend::Azure)
    }

    pub fn gcp() -> Self {
        Self::new(StorageBackend::Gcp)
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Options without the crate-internal `pulse.*` keys and without the
    /// location keys, ready to be handed to object_store.
    pub fn clean_options(&self) -> HashMap<String, String> {
        self.options
            .iter()
            .filter(|(k, _)| {
                !k.starts_with(INTERNAL_OPTION_PREFIX) && k.as_str() != "path" && k.as_str() != "url"
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn max_retries(&self) -> StorageResult<usize> {
        match self.option(MAX_RETRIES_OPTION) {
            None => Ok(DEFAULT_MAX_RETRIES),
            Some(raw) => raw.parse().map_err(|_| {
                StorageError::ConfigError(format!(
                    "{} must be a non-negative integer, got '{}'",
                    MAX_RETRIES_OPTION, raw
                ))
            }),
        }
    }

    /// Resolve the root URL of this storage location.
    pub fn base_url(&self) -> StorageResult<Url> {
        match self.backend {
            StorageBackend::Local => {
                let raw = self.option("path").ok_or_else(|| {
                    StorageError::ConfigError("local storage requires a 'path' option".to_string())
                })?;
                let mut path = PathBuf::from(raw);
                if path.is_relative() {
                    path = std::env::current_dir()?.join(path);
                }
                Url::from_directory_path(&path).map_err(|_| {
                    StorageError::ConfigError(format!(
                        "cannot turn path '{}' into a file URL",
                        path.display()
                    ))
                })
            }
            StorageBackend::Aws | StorageBackend::Azure | StorageBackend::Gcp => {
                let raw = self.option("url").ok_or_else(|| {
                    StorageError::ConfigError(format!(
                        "{:?} storage requires a 'url' option",
                        self.backend
                    ))
                })?;
                let url = Url::parse(raw)?;
                let expected: &[&str] = match self.backend {
                    StorageBackend::Aws => &["s3", "s3a"],
                    StorageBackend::Azure => &["az", "adl", "azure", "abfs", "abfss"],
                    _ => &["gs"],
                };
                if !expected.contains(&url.scheme()) {
                    return Err(StorageError::ConfigError(format!(
                        "scheme '{}' does not match {:?} storage",
                        url.scheme(),
                        self.backend
                    )));
                }
                Ok(url)
            }
        }
    }
}
