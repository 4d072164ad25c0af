use thiserror::Error;

/// Failures while listing, reading or stating table files.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The storage options do not describe a usable location.
    #[error("Invalid storage configuration: {0}")]
    ConfigError(String),

    /// A file the table log references is absent from storage.
    #[error("File not found in storage: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),

    #[error("Invalid storage URL: {0}")]
    UrlParseError(#[from] url::ParseError),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
