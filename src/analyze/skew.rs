//! Partition skew: how unevenly rows are spread over partitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::error::{AnalyzeError, AnalyzeResult};
use crate::reader::PartitionKey;

/// How partition imbalance is normalized into `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkewMethod {
    /// `(max - min) / max`
    Max,
    /// Mean absolute deviation over the mean.
    Average,
}

/// Normalized imbalance of `counts`. A single partition (or none) is never skewed.
pub fn skewness(counts: &[u64], method: SkewMethod) -> f64 {
    if counts.len() <= 1 {
        return 0.0;
    }
    match method {
        SkewMethod::Max => {
            let max = counts.iter().copied().max().unwrap_or(0);
            let min = counts.iter().copied().min().unwrap_or(0);
            if max == 0 {
                return 0.0;
            }
            (max - min) as f64 / max as f64
        }
        SkewMethod::Average => {
            let n = counts.len() as f64;
            let mean = counts.iter().map(|&c| c as f64).sum::<f64>() / n;
            if mean == 0.0 {
                return 0.0;
            }
            let mean_abs_dev = counts.iter().map(|&c| (c as f64 - mean).abs()).sum::<f64>() / n;
            mean_abs_dev / mean
        }
    }
}

/// Skew measurements bundled for reporting.
///
/// `skewness_max` and `is_skewed` here are the same values the table metrics
/// carry at top level.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SkewMetrics {
    pub partition_columns: Vec<String>,

    /// Row count per partition, keyed by the rendered partition key
    pub records_per_partition_dict: BTreeMap<String, u64>,

    pub skewness_max: f64,
    pub skewness_average: f64,
    pub is_skewed: bool,

    /// Set when the computation failed and the values above are defaults
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

/// Counts keyed by rendered partition value. Distinct keys that render alike
/// (`null` and `"null"`) share one entry.
fn report_counts(counts: &BTreeMap<PartitionKey, u64>) -> BTreeMap<String, u64> {
    let mut report = BTreeMap::new();
    for (key, count) in counts {
        *report.entry(key.to_string()).or_insert(0) += *count;
    }
    report
}

impl SkewMetrics {
    /// Measure skew over realized per-partition row counts.
    pub fn compute(
        partition_columns: &[String],
        counts: &BTreeMap<PartitionKey, u64>,
        threshold: f64,
    ) -> AnalyzeResult<Self> {
        if partition_columns.is_empty() {
            return Err(AnalyzeError::config(
                "skew requires a table with at least one partition column",
            ));
        }

        let values: Vec<u64> = counts.values().copied().collect();
        let skewness_max = skewness(&values, SkewMethod::Max);
        let skewness_average = skewness(&values, SkewMethod::Average);

        Ok(Self {
            partition_columns: partition_columns.to_vec(),
            records_per_partition_dict: report_counts(counts),
            skewness_max,
            skewness_average,
            is_skewed: skewness_max > threshold,
            error: None,
        })
    }

    /// Zeroed metrics annotated with the failure.
    pub fn failed(partition_columns: &[String], error: impl ToString) -> Self {
        Self {
            partition_columns: partition_columns.to_vec(),
            error: Some(error.to_string()),
            ..Self::default()
        }
    }

    pub fn partition_count(&self) -> usize {
        self.records_per_partition_dict.len()
    }

    /// Largest and smallest partition by row count.
    pub fn extremes(&self) -> Option<((&str, u64), (&str, u64))> {
        let max = self
            .records_per_partition_dict
            .iter()
            .max_by_key(|(_, count)| **count)?;
        let min = self
            .records_per_partition_dict
            .iter()
            .min_by_key(|(_, count)| **count)?;
        Some(((max.0.as_str(), *max.1), (min.0.as_str(), *min.1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn counts(pairs: &[(&str, u64)]) -> BTreeMap<PartitionKey, u64> {
        pairs
            .iter()
            .map(|(k, v)| (PartitionKey::new(vec![json!(k)]), *v))
            .collect()
    }

    fn day() -> Vec<String> {
        vec!["day".to_string()]
    }

    #[test]
    fn test_equal_partitions_are_not_skewed() {
        let counts = counts(&[("A", 200), ("B", 200), ("C", 200), ("D", 200), ("E", 200)]);
        let skew = SkewMetrics::compute(&day(), &counts, 0.1).unwrap();
        assert_eq!(skew.skewness_max, 0.0);
        assert_eq!(skew.skewness_average, 0.0);
        assert!(!skew.is_skewed);
    }

    #[test]
    fn test_skewed_partitions() {
        let counts = counts(&[("A", 600), ("B", 200), ("C", 100), ("D", 50), ("E", 50)]);
        let skew = SkewMetrics::compute(&day(), &counts, 0.1).unwrap();
        assert!((skew.skewness_max - 550.0 / 600.0).abs() < 1e-9);
        assert!(skew.is_skewed);
        // mean 200, deviations 400+0+100+150+150 = 800, / 5 = 160, / 200
        assert!((skew.skewness_average - 0.8).abs() < 1e-9);
        assert_eq!(skew.records_per_partition_dict["A"], 600);
        assert_eq!(skew.extremes(), Some((("A", 600), ("D", 50))));
    }

    #[test]
    fn test_null_and_text_null_are_separate_partitions() {
        let mut counts = BTreeMap::new();
        counts.insert(PartitionKey::new(vec![serde_json::Value::Null]), 3);
        counts.insert(PartitionKey::new(vec![json!("null")]), 12);

        let skew = SkewMetrics::compute(&day(), &counts, 0.1).unwrap();
        assert!((skew.skewness_max - 0.75).abs() < 1e-9);
        assert_eq!(skew.records_per_partition_dict.len(), 1);
        assert_eq!(skew.records_per_partition_dict["null"], 15);
    }

    #[test]
    fn test_single_partition_is_not_skewed() {
        assert_eq!(skewness(&[42], SkewMethod::Max), 0.0);
        assert_eq!(skewness(&[], SkewMethod::Average), 0.0);
        assert_eq!(skewness(&[0, 0], SkewMethod::Max), 0.0);
        assert_eq!(skewness(&[0, 0], SkewMethod::Average), 0.0);
    }

    #[test]
    fn test_skewness_bounds() {
        let samples: [&[u64]; 4] = [&[1, 1000], &[5, 0, 7], &[3, 3, 3, 9], &[u64::MAX / 4, 1]];
        for sample in samples {
            let max = skewness(sample, SkewMethod::Max);
            assert!((0.0..=1.0).contains(&max), "{:?} -> {}", sample, max);
            assert!(skewness(sample, SkewMethod::Average) >= 0.0);
        }
    }

    #[test]
    fn test_unpartitioned_table_is_a_configuration_error() {
        let err = SkewMetrics::compute(&[], &BTreeMap::new(), 0.1).unwrap_err();
        assert!(matches!(err, AnalyzeError::Configuration(_)));
    }

    #[test]
    fn test_failed_carries_error_annotation() {
        let skew = SkewMetrics::failed(&day(), "boom");
        assert_eq!(skew.error.as_deref(), Some("boom"));
        assert_eq!(skew.skewness_max, 0.0);
        let json = serde_json::to_value(&skew).unwrap();
        assert_eq!(json["error"], "boom");
        let clean = serde_json::to_value(SkewMetrics::default()).unwrap();
        assert!(clean.get("error").is_none());
    }
}
