use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::{Row, SqlSession};
use crate::analyze::error::{AnalyzeError, AnalyzeResult};
use crate::analyze::TableIdentifier;
use crate::reader::{HistoryEntry, PartitionKey};

const COUNT_COLUMN: &str = "pulse_row_count";

/// What `DESCRIBE DETAIL` reports about a Delta table.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableDetail {
    pub size_in_bytes: u64,
    pub num_files: u64,
    pub location: String,
    pub partition_columns: Vec<String>,
}

/// A Delta table as seen through an engine session.
pub struct EngineTable {
    session: Arc<dyn SqlSession>,
    reference: String,
}

/// Quote an identifier with backticks, doubling embedded backticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

impl EngineTable {
    pub fn new(session: Arc<dyn SqlSession>, identifier: &TableIdentifier) -> Self {
        let reference = match identifier {
            TableIdentifier::Name(name) => name.clone(),
            TableIdentifier::Path(path) => format!("delta.{}", quote_identifier(path)),
        };
        Self { session, reference }
    }

    /// The table reference used in `FROM` clauses.
    pub fn reference(&self) -> &str {
        &self.reference
    }

    async fn query(&self, query: String) -> AnalyzeResult<Vec<Row>> {
        debug!("Running engine query={}", query);
        self.session.sql(&query).await
    }

    pub async fn describe_detail(&self) -> AnalyzeResult<TableDetail> {
        let rows = self
            .query(format!("DESCRIBE DETAIL {}", self.reference))
            .await?;
        let row = rows.into_iter().next().ok_or_else(|| {
            AnalyzeError::Engine(format!("DESCRIBE DETAIL {} returned no rows", self.reference))
        })?;
        Ok(serde_json::from_value(Value::Object(row))?)
    }

    /// Operation history in ascending version order.
    pub async fn describe_history(&self) -> AnalyzeResult<Vec<HistoryEntry>> {
        let rows = self
            .query(format!("DESCRIBE HISTORY {}", self.reference))
            .await?;
        let mut history = rows
            .iter()
            .map(history_entry)
            .collect::<AnalyzeResult<Vec<_>>>()?;
        history.sort_by_key(|entry| entry.version);
        Ok(history)
    }

    /// Row count per partition value tuple. Partitions without rows are left out.
    pub async fn partition_counts(
        &self,
        columns: &[String],
    ) -> AnalyzeResult<BTreeMap<PartitionKey, u64>> {
        if columns.is_empty() {
            return Err(AnalyzeError::config(
                "partition counts need at least one partition column",
            ));
        }
        let quoted: Vec<String> = columns.iter().map(|c| quote_identifier(c)).collect();
        let group_by = quoted.join(", ");
        let rows = self
            .query(format!(
                "SELECT {}, COUNT(*) AS {} FROM {} GROUP BY {}",
                group_by, COUNT_COLUMN, self.reference, group_by
            ))
            .await?;

        let mut counts = BTreeMap::new();
        for row in &rows {
            let key = PartitionKey::new(
                columns
                    .iter()
                    .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                    .collect(),
            );
            let count = count_value(row, COUNT_COLUMN)?;
            if count > 0 {
                *counts.entry(key).or_insert(0) += count;
            }
        }
        Ok(counts)
    }

    pub async fn record_count(&self) -> AnalyzeResult<u64> {
        let rows = self
            .query(format!(
                "SELECT COUNT(*) AS {} FROM {}",
                COUNT_COLUMN, self.reference
            ))
            .await?;
        match rows.first() {
            Some(row) => count_value(row, COUNT_COLUMN),
            None => Ok(0),
        }
    }
}

fn count_value(row: &Row, column: &str) -> AnalyzeResult<u64> {
    match row.get(column) {
        Some(Value::Number(n)) => n.as_u64().ok_or_else(|| {
            AnalyzeError::Engine(format!("column {} holds a non-count value {}", column, n))
        }),
        Some(Value::String(s)) => s.parse().map_err(|_| {
            AnalyzeError::Engine(format!("column {} holds a non-count value {}", column, s))
        }),
        other => Err(AnalyzeError::Engine(format!(
            "column {} missing from result row, got {:?}",
            column, other
        ))),
    }
}

fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::Number(n) => Utc.timestamp_millis_opt(n.as_i64()?).single(),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|ts| ts.with_timezone(&Utc))
            .ok(),
        _ => None,
    }
}

fn object_field(row: &Row, key: &str) -> Map<String, Value> {
    match row.get(key) {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    }
}

fn history_entry(row: &Row) -> AnalyzeResult<HistoryEntry> {
    let version = row
        .get("version")
        .and_then(|v| match v {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        })
        .ok_or_else(|| AnalyzeError::Engine(format!("history row without version: {:?}", row)))?;

    Ok(HistoryEntry {
        operation: row
            .get("operation")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        timestamp: parse_timestamp(row.get("timestamp")),
        version,
        operation_metrics: object_field(row, "operationMetrics"),
        operation_parameters: object_field(row, "operationParameters"),
    })
}
