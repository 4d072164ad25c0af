//! Storage access for table analysis.
//!
//! Everything the local backend needs from storage (recursive listing,
//! per-file metadata and reading transaction log commits) goes through the
//! [`StorageProvider`] trait, so the same analysis code runs against a local
//! directory or a cloud bucket.

pub mod config;
pub mod error;
pub mod factory;
pub mod generic;
pub mod provider;

pub use config::{StorageBackend, StorageConfig};
pub use error::{StorageError, StorageResult};
pub use factory::StorageProviderFactory;
pub use generic::GenericStorageProvider;
pub use provider::{FileMetadata, StorageProvider};
