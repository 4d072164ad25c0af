//! Table reading capabilities consumed by the analysis backends.
//!
//! The local backend talks to a [`TableReader`] that hands out
//! [`TableHandle`]s; [`delta::DeltaLogReader`] is the built-in implementation,
//! reading the `_delta_log` with `deltalake` over the storage provider's
//! location and options. The distributed
//! backend talks to a query engine through [`engine::SqlSession`].

pub mod delta;
pub mod engine;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::analyze::error::{AnalyzeError, AnalyzeResult};
use crate::analyze::Backend;

/// One raw entry of a table's operation history.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoryEntry {
    pub operation: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub version: i64,
    pub operation_metrics: Map<String, Value>,
    pub operation_parameters: Map<String, Value>,
}

/// Opens tables for the local analysis backend.
#[async_trait]
pub trait TableReader: Send + Sync {
    /// Open the table stored at `location` (relative to the reader's storage root).
    async fn open(&self, location: &str) -> AnalyzeResult<Box<dyn TableHandle>>;
}

/// An opened table. The handle reflects the table as of the moment it was opened.
#[async_trait]
pub trait TableHandle: Send + Sync {
    /// The backend this handle was produced for.
    fn kind(&self) -> Backend;

    /// Fully qualified location of the table.
    fn table_uri(&self) -> String;

    /// Declared partition columns, in declaration order.
    fn partition_columns(&self) -> &[String];

    /// Operation history in ascending version order.
    async fn history(&self) -> AnalyzeResult<Vec<HistoryEntry>>;

    /// Storage-relative location of every file in the live snapshot.
    async fn file_uris(&self) -> AnalyzeResult<Vec<String>>;

    /// The live snapshot.
    async fn read_snapshot(&self) -> AnalyzeResult<SnapshotView>;
}

/// A live data file together with what the log knows about it.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotFile {
    pub path: String,
    pub size: u64,
    pub partition_values: HashMap<String, Option<String>>,
    pub num_records: Option<u64>,
}

/// Row-level view of a snapshot, built from per-file statistics.
#[derive(Debug, Clone, Default)]
pub struct SnapshotView {
    files: Vec<SnapshotFile>,
}

impl SnapshotView {
    pub fn new(files: Vec<SnapshotFile>) -> Self {
        Self { files }
    }

    pub fn files(&self) -> &[SnapshotFile] {
        &self.files
    }

    fn records_of(file: &SnapshotFile) -> AnalyzeResult<u64> {
        file.num_records.ok_or_else(|| {
            AnalyzeError::Log(format!(
                "file {} carries no numRecords statistics",
                file.path
            ))
        })
    }

    /// Number of rows in the snapshot.
    pub fn num_rows(&self) -> AnalyzeResult<u64> {
        self.files.iter().map(Self::records_of).sum()
    }

    /// Row count per distinct partition value tuple. Partitions without rows
    /// are left out.
    pub fn partition_row_counts(
        &self,
        columns: &[String],
    ) -> AnalyzeResult<BTreeMap<PartitionKey, u64>> {
        let mut counts: BTreeMap<PartitionKey, u64> = BTreeMap::new();
        for file in &self.files {
            let records = Self::records_of(file)?;
            let key = PartitionKey::new(
                columns
                    .iter()
                    .map(|column| match file.partition_values.get(column) {
                        Some(Some(value)) => Value::String(value.clone()),
                        _ => Value::Null,
                    })
                    .collect(),
            );
            *counts.entry(key).or_insert(0) += records;
        }
        counts.retain(|_, count| *count > 0);
        Ok(counts)
    }
}

/// The values of all partition columns for one partition, in column order.
///
/// A single-column key displays as the bare value (`Mon`); a composite key
/// displays as an ordered tuple (`("Mon", "Dinner")`). `null` stands for a
/// missing value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionKey(Vec<Value>);

impl PartitionKey {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }
}

/// Orders JSON values by type first (null, bool, number, string, other),
/// then by value, so `null` and `"null"` or `1` and `"1"` stay distinct.
fn value_order(value: &Value) -> (u8, Cow<'_, str>) {
    match value {
        Value::Null => (0, Cow::Borrowed("")),
        Value::Bool(b) => (1, Cow::Borrowed(if *b { "true" } else { "false" })),
        Value::Number(n) => (2, Cow::Owned(n.to_string())),
        Value::String(s) => (3, Cow::Borrowed(s.as_str())),
        other => (4, Cow::Owned(other.to_string())),
    }
}

impl PartialEq for PartitionKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PartitionKey {}

impl Ord for PartitionKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .iter()
            .map(value_order)
            .cmp(other.0.iter().map(value_order))
    }
}

impl PartialOrd for PartitionKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for PartitionKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self.0.as_slice() {
            [Value::String(s)] => f.write_str(s),
            [single] => write!(f, "{}", single),
            values => {
                let parts: Vec<String> = values.iter().map(Value::to_string).collect();
                write!(f, "({})", parts.join(", "))
            }
        }
    }
}
