use async_trait::async_trait;
use delta_pulse::analyze::{
    AnalysisOptions, AnalyzeResult, Analyzer, Backend, DistributedHeuristics, TableIdentifier,
};
use delta_pulse::reader::engine::{Row, SqlSession};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

/// Answers the engine queries of the distributed backend from canned rows.
struct CannedSession {
    queries: Mutex<Vec<String>>,
    detail: Value,
    history: Vec<Value>,
    partitions: Vec<Value>,
    row_count: u64,
}

impl CannedSession {
    fn tips() -> Self {
        Self {
            queries: Mutex::new(Vec::new()),
            detail: json!({
                "format": "delta",
                "location": "dbfs:/mnt/tips",
                "sizeInBytes": 20 * 5 * 1024 * 1024,
                "numFiles": 20,
                "partitionColumns": ["day"]
            }),
            history: (0..12)
                .map(|v| json!({"version": v, "timestamp": "2024-01-01T00:00:00Z", "operation": "WRITE"}))
                .rev()
                .collect(),
            partitions: vec![
                json!({"day": "A", "pulse_row_count": 600}),
                json!({"day": "B", "pulse_row_count": 200}),
                json!({"day": "C", "pulse_row_count": 100}),
                json!({"day": "D", "pulse_row_count": 50}),
                json!({"day": "E", "pulse_row_count": 50}),
            ],
            row_count: 1000,
        }
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

fn rows(values: Vec<Value>) -> Vec<Row> {
    values
        .into_iter()
        .filter_map(|v| v.as_object().cloned())
        .collect()
}

#[async_trait]
impl SqlSession for CannedSession {
    async fn sql(&self, query: &str) -> AnalyzeResult<Vec<Row>> {
        self.queries.lock().unwrap().push(query.to_string());
        let result = if query.starts_with("DESCRIBE DETAIL") {
            vec![self.detail.clone()]
        } else if query.starts_with("DESCRIBE HISTORY") {
            self.history.clone()
        } else if query.contains("GROUP BY") {
            self.partitions.clone()
        } else {
            vec![json!({ "pulse_row_count": self.row_count })]
        };
        Ok(rows(result))
    }
}

#[tokio::test]
async fn test_distributed_analysis_by_path() {
    let session = Arc::new(CannedSession::tips());
    let analyzer = Analyzer::builder(Backend::Distributed)
        .with_session(session.clone())
        .build()
        .await
        .unwrap();

    let metrics = analyzer
        .analyze(&TableIdentifier::parse("/mnt/tips"))
        .await
        .unwrap();

    let queries = session.queries();
    assert_eq!(queries[0], "DESCRIBE DETAIL delta.`/mnt/tips`");
    assert!(queries
        .iter()
        .any(|q| q.ends_with("FROM delta.`/mnt/tips` GROUP BY `day`")));

    assert_eq!(metrics.table_path, "dbfs:/mnt/tips");
    assert_eq!(metrics.version_count, 11);
    assert_eq!(metrics.number_of_writes, 12);
    assert_eq!(metrics.record_count, 1000);
    assert_eq!(metrics.folder_size_bytes, metrics.table_size_bytes);
    assert_eq!(metrics.total_file_count, 20);

    assert!((metrics.skewness_max - 0.9167).abs() < 1e-4);
    assert!(metrics.is_skewed);

    // 12 writes and no optimize trips the vacuum heuristic: 10% of 20 files.
    assert!(metrics.needs_vacuum);
    assert_eq!(metrics.files_needing_vacuum, 2);
    assert!(metrics.has_orphan_files);
    assert_eq!(metrics.orphan_files_count, 2);

    // 5 MB files sit below the 10 MB cutoff: 80% of files are assumed small.
    assert_eq!(metrics.small_files_count, 16);
    assert!(metrics.needs_optimize);
    assert_eq!(metrics.storage_efficiency, Some(0.95));
    assert!(metrics.health_score().is_some());
}

#[tokio::test]
async fn test_heuristics_are_configurable() {
    let analyzer = Analyzer::builder(Backend::Distributed)
        .with_session(Arc::new(CannedSession::tips()))
        .with_heuristics(DistributedHeuristics {
            storage_efficiency: 0.5,
            vacuum_write_optimize_ratio: 20,
            ..DistributedHeuristics::default()
        })
        .build()
        .await
        .unwrap();

    let metrics = analyzer
        .analyze_with_options(
            &TableIdentifier::Name("main.sales.tips".to_string()),
            &AnalysisOptions::default().with_skew_threshold(0.95),
        )
        .await
        .unwrap();

    assert_eq!(metrics.storage_efficiency, Some(0.5));
    // 12 writes, no optimizes: 12 > 20 * 0 still needs vacuum
    assert!(metrics.needs_vacuum);
    assert!(!metrics.is_skewed);
}
