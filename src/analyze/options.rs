use serde::{Deserialize, Serialize};

use super::constants::*;
use super::error::{AnalyzeError, AnalyzeResult};

/// Thresholds controlling how measurements turn into maintenance flags.
///
/// ```
/// use delta_pulse::analyze::AnalysisOptions;
///
/// let options = AnalysisOptions::default()
///     .with_skew_threshold(0.2)
///     .with_small_file_size_mb(Some(32.0));
/// assert_eq!(options.vacuum_size_ratio_threshold, 0.7);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// A table is skewed when `skewness_max` exceeds this.
    pub skew_threshold: f64,
    /// Vacuum is needed when tracked bytes / physical bytes drops below this.
    pub vacuum_size_ratio_threshold: f64,
    /// Orphans are reported when tracked files / physical files drops below this.
    pub orphan_file_ratio_threshold: f64,
    /// Files below this size are small. `None` uses the average tracked file size.
    pub small_file_size_mb: Option<f64>,
    /// Optimize is needed when more than this fraction of tracked files is small.
    pub small_file_ratio_threshold: f64,
    /// Concurrent per-file metadata requests in the file inventory stage.
    pub parallelism: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            skew_threshold: DEFAULT_SKEW_THRESHOLD,
            vacuum_size_ratio_threshold: DEFAULT_VACUUM_SIZE_RATIO_THRESHOLD,
            orphan_file_ratio_threshold: DEFAULT_ORPHAN_FILE_RATIO_THRESHOLD,
            small_file_size_mb: Some(DEFAULT_SMALL_FILE_SIZE_MB),
            small_file_ratio_threshold: DEFAULT_SMALL_FILE_RATIO_THRESHOLD,
            parallelism: 1,
        }
    }
}

impl AnalysisOptions {
    pub fn with_skew_threshold(mut self, threshold: f64) -> Self {
        self.skew_threshold = threshold;
        self
    }

    pub fn with_vacuum_size_ratio_threshold(mut self, threshold: f64) -> Self {
        self.vacuum_size_ratio_threshold = threshold;
        self
    }

    pub fn with_orphan_file_ratio_threshold(mut self, threshold: f64) -> Self {
        self.orphan_file_ratio_threshold = threshold;
        self
    }

    pub fn with_small_file_size_mb(mut self, size_mb: Option<f64>) -> Self {
        self.small_file_size_mb = size_mb;
        self
    }

    pub fn with_small_file_ratio_threshold(mut self, threshold: f64) -> Self {
        self.small_file_ratio_threshold = threshold;
        self
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Small-file cutoff in bytes, if one was configured.
    pub fn small_file_threshold_bytes(&self) -> Option<f64> {
        self.small_file_size_mb.map(|mb| mb * BYTES_PER_MB)
    }

    pub fn validate(&self) -> AnalyzeResult<()> {
        let ratios = [
            ("skew_threshold", self.skew_threshold),
            ("vacuum_size_ratio_threshold", self.vacuum_size_ratio_threshold),
            ("orphan_file_ratio_threshold", self.orphan_file_ratio_threshold),
            ("small_file_ratio_threshold", self.small_file_ratio_threshold),
        ];
        for (name, value) in ratios {
            if !value.is_finite() || value < 0.0 {
                return Err(AnalyzeError::config(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        if let Some(size_mb) = self.small_file_size_mb {
            if !size_mb.is_finite() || size_mb <= 0.0 {
                return Err(AnalyzeError::config(format!(
                    "small_file_size_mb must be positive, got {}",
                    size_mb
                )));
            }
        }
        if self.parallelism == 0 {
            return Err(AnalyzeError::config("parallelism must be at least 1"));
        }
        Ok(())
    }
}

/// Estimates the distributed backend uses in place of measurements it cannot
/// make cheaply through the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributedHeuristics {
    /// Reported as `storage_efficiency`; the engine exposes no untracked bytes.
    pub storage_efficiency: f64,
    /// Vacuum is assumed needed when writes exceed this many times the optimizes.
    pub vacuum_write_optimize_ratio: u64,
    /// Share of data files assumed to need vacuuming when vacuum is needed.
    pub vacuum_file_fraction: f64,
    /// Share of files assumed small when the average file is below the cutoff.
    pub small_band_fraction: f64,
    /// Share of files assumed small when the average file is below twice the cutoff.
    pub medium_band_fraction: f64,
    /// Share of files assumed small otherwise.
    pub large_band_fraction: f64,
}

impl Default for DistributedHeuristics {
    fn default() -> Self {
        Self {
            storage_efficiency: DISTRIBUTED_STORAGE_EFFICIENCY,
            vacuum_write_optimize_ratio: DISTRIBUTED_VACUUM_WRITE_OPTIMIZE_RATIO,
            vacuum_file_fraction: DISTRIBUTED_VACUUM_FILE_FRACTION,
            small_band_fraction: DISTRIBUTED_SMALL_BAND_FRACTION,
            medium_band_fraction: DISTRIBUTED_MEDIUM_BAND_FRACTION,
            large_band_fraction: DISTRIBUTED_LARGE_BAND_FRACTION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = AnalysisOptions::default();
        assert_eq!(options.skew_threshold, 0.1);
        assert_eq!(options.vacuum_size_ratio_threshold, 0.7);
        assert_eq!(options.orphan_file_ratio_threshold, 0.8);
        assert_eq!(options.small_file_size_mb, Some(10.0));
        assert_eq!(options.small_file_ratio_threshold, 0.3);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_small_file_threshold_bytes() {
        let options = AnalysisOptions::default();
        assert_eq!(options.small_file_threshold_bytes(), Some(10.0 * 1024.0 * 1024.0));
        let options = options.with_small_file_size_mb(None);
        assert_eq!(options.small_file_threshold_bytes(), None);
    }

    #[test]
    fn test_partial_deserialization_keeps_defaults() {
        let options: AnalysisOptions =
            serde_json::from_str(r#"{"skew_threshold": 0.25, "small_file_size_mb": null}"#)
                .unwrap();
        assert_eq!(options.skew_threshold, 0.25);
        assert_eq!(options.small_file_size_mb, None);
        assert_eq!(options.orphan_file_ratio_threshold, 0.8);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(AnalysisOptions::default()
            .with_skew_threshold(-0.1)
            .validate()
            .is_err());
        assert!(AnalysisOptions::default()
            .with_small_file_size_mb(Some(0.0))
            .validate()
            .is_err());
        assert!(AnalysisOptions::default()
            .with_parallelism(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_distributed_heuristic_defaults() {
        let heuristics = DistributedHeuristics::default();
        assert_eq!(heuristics.storage_efficiency, 0.95);
        assert_eq!(heuristics.vacuum_write_optimize_ratio, 10);
        assert_eq!(heuristics.small_band_fraction, 0.8);
    }
}
