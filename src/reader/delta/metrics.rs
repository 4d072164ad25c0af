use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::reader::HistoryEntry;

/// Operation tag of a Delta history entry, as far as health analysis cares.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperationType {
    Write,
    Merge,
    Delete,
    Optimize,
    Other(String),
}

impl OperationType {
    pub fn as_str(&self) -> &str {
        match self {
            OperationType::Write => "WRITE",
            OperationType::Merge => "MERGE",
            OperationType::Delete => "DELETE",
            OperationType::Optimize => "OPTIMIZE",
            OperationType::Other(tag) => tag,
        }
    }

    /// Whether the entry counts towards the maintenance history.
    pub fn is_tracked(&self) -> bool {
        !matches!(self, OperationType::Other(_))
    }
}

impl From<&str> for OperationType {
    fn from(tag: &str) -> Self {
        match tag {
            "WRITE" => OperationType::Write,
            "MERGE" => OperationType::Merge,
            "DELETE" => OperationType::Delete,
            "OPTIMIZE" => OperationType::Optimize,
            other => OperationType::Other(other.to_string()),
        }
    }
}

impl From<String> for OperationType {
    fn from(tag: String) -> Self {
        OperationType::from(tag.as_str())
    }
}

impl From<OperationType> for String {
    fn from(op: OperationType) -> Self {
        op.as_str().to_string()
    }
}

impl Display for OperationType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// One operation from a Delta table's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaMetrics {
    pub operation_type: OperationType,

    /// RFC 3339 commit time, empty if the log did not record one
    pub timestamp: String,

    /// Table version the operation produced
    pub version: i64,

    /// Free-form numeric counters (`numFiles`, `numOutputRows`, ...)
    pub operation_metrics: Map<String, Value>,

    /// Free-form operation parameters (`mode`, `predicate`, ...)
    pub parameters: Map<String, Value>,
}

impl From<&HistoryEntry> for DeltaMetrics {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            operation_type: OperationType::from(entry.operation.as_str()),
            timestamp: entry
                .timestamp
                .map(|ts| ts.to_rfc3339())
                .unwrap_or_default(),
            version: entry.version,
            operation_metrics: entry.operation_metrics.clone(),
            parameters: entry.operation_parameters.clone(),
        }
    }
}
