use std::fmt::{Display, Formatter, Result as FmtResult};
use thiserror::Error;

use crate::analyze::Backend;
use crate::storage::StorageError;

/// Errors that abort an analysis.
///
/// Failures of a single metric group are not reported through this type;
/// see [`MetricError`].
#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Backend type mismatch: expected a {expected} table handle, got {found}")]
    BackendTypeMismatch { expected: Backend, found: Backend },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Transaction log error: {0}")]
    Log(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AnalyzeError {
    pub fn config(message: impl Into<String>) -> Self {
        AnalyzeError::Configuration(message.into())
    }
}

/// Result type for analysis operations
pub type AnalyzeResult<T> = Result<T, AnalyzeError>;

/// The independently fault-isolated metric groups of an analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricStage {
    Skew,
    FolderSize,
    RecordCount,
    FileInventory,
}

impl Display for MetricStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            MetricStage::Skew => "skew",
            MetricStage::FolderSize => "folder_size",
            MetricStage::RecordCount => "record_count",
            MetricStage::FileInventory => "file_inventory",
        };
        f.write_str(name)
    }
}

/// A recoverable failure of one metric group.
///
/// The backend logs it, replaces the group with its safe default and carries on.
#[derive(Error, Debug)]
#[error("Failed to calculate {stage}: {message}")]
pub struct MetricError {
    pub stage: MetricStage,
    pub message: String,
}

impl MetricError {
    pub fn new(stage: MetricStage, source: impl Display) -> Self {
        Self {
            stage,
            message: source.to_string(),
        }
    }
}
