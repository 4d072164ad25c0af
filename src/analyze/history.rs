use crate::reader::delta::{DeltaMetrics, OperationType};
use crate::reader::HistoryEntry;

/// Operation counters distilled from a table's history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistorySummary {
    /// Highest version seen, 0 for an empty history
    pub version_count: i64,
    pub number_of_writes: u64,
    pub number_of_merges: u64,
    pub number_of_deletes: u64,
    pub number_of_optimizes: u64,
    /// Entries with a tracked operation, in history order
    pub operations: Vec<DeltaMetrics>,
}

impl HistorySummary {
    pub fn from_entries(entries: &[HistoryEntry]) -> Self {
        let mut summary = Self {
            version_count: entries.iter().map(|e| e.version).max().unwrap_or(0),
            ..Self::default()
        };

        for entry in entries {
            let operation = DeltaMetrics::from(entry);
            if !operation.operation_type.is_tracked() {
                continue;
            }
            match operation.operation_type {
                OperationType::Write => summary.number_of_writes += 1,
                OperationType::Merge => summary.number_of_merges += 1,
                OperationType::Delete => summary.number_of_deletes += 1,
                OperationType::Optimize => summary.number_of_optimizes += 1,
                OperationType::Other(_) => {}
            }
            summary.operations.push(operation);
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(version: i64, operation: &str) -> HistoryEntry {
        HistoryEntry {
            operation: operation.to_string(),
            version,
            ..HistoryEntry::default()
        }
    }

    #[test]
    fn test_counts_tracked_operations() {
        let entries = vec![
            entry(0, "CREATE TABLE"),
            entry(1, "WRITE"),
            entry(2, "WRITE"),
            entry(3, "DELETE"),
            entry(4, "WRITE"),
            entry(5, "MERGE"),
            entry(6, "WRITE"),
        ];
        let summary = HistorySummary::from_entries(&entries);
        assert_eq!(summary.number_of_writes, 4);
        assert_eq!(summary.number_of_deletes, 1);
        assert_eq!(summary.number_of_optimizes, 0);
        assert_eq!(summary.number_of_merges, 1);
        assert_eq!(summary.version_count, 6);
        assert_eq!(summary.operations.len(), 6);
        assert_eq!(summary.operations[0].version, 1);
    }

    #[test]
    fn test_empty_history() {
        assert_eq!(HistorySummary::from_entries(&[]), HistorySummary::default());
    }
}
