//! Constants shared by the analysis backends and the health score.

/// Bytes in a mebibyte.
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// File size a compacted table should approach. Used for `file_size_efficiency`.
/// Default: 128 MB
pub const IDEAL_FILE_SIZE_BYTES: u64 = 128 * 1024 * 1024;

/// Extension of the data files a Delta table tracks.
pub const DATA_FILE_EXTENSION: &str = ".parquet";

/// Directory holding the Delta transaction log.
pub const DELTA_LOG_DIR: &str = "_delta_log";

// Default analysis thresholds

pub const DEFAULT_SKEW_THRESHOLD: f64 = 0.1;
pub const DEFAULT_VACUUM_SIZE_RATIO_THRESHOLD: f64 = 0.7;
pub const DEFAULT_ORPHAN_FILE_RATIO_THRESHOLD: f64 = 0.8;
pub const DEFAULT_SMALL_FILE_SIZE_MB: f64 = 10.0;
pub const DEFAULT_SMALL_FILE_RATIO_THRESHOLD: f64 = 0.3;

// Health score bands. Each of the four components is worth 25 points.

pub const COMPONENT_MAX_SCORE: f64 = 25.0;

/// Writes needed for full freshness credit.
pub const FRESHNESS_WRITE_TARGET: f64 = 10.0;

/// Optimize-to-write ratio multiplier; one optimize per ten writes earns full credit.
pub const OPTIMIZE_RATIO_MULTIPLIER: f64 = 10.0;

/// Skew is scaled by this before being taken off the balance band.
pub const SKEW_PENALTY_MULTIPLIER: f64 = 100.0;

pub const HEALTHY_SCORE_THRESHOLD: f64 = 80.0;
pub const UNHEALTHY_SCORE_THRESHOLD: f64 = 50.0;

// Distributed backend placeholders, overridable through `DistributedHeuristics`.

pub const DISTRIBUTED_STORAGE_EFFICIENCY: f64 = 0.95;
pub const DISTRIBUTED_VACUUM_WRITE_OPTIMIZE_RATIO: u64 = 10;
pub const DISTRIBUTED_VACUUM_FILE_FRACTION: f64 = 0.1;
pub const DISTRIBUTED_SMALL_BAND_FRACTION: f64 = 0.8;
pub const DISTRIBUTED_MEDIUM_BAND_FRACTION: f64 = 0.3;
pub const DISTRIBUTED_LARGE_BAND_FRACTION: f64 = 0.1;

const _: () = assert!(UNHEALTHY_SCORE_THRESHOLD < HEALTHY_SCORE_THRESHOLD);
const _: () = assert!(DISTRIBUTED_LARGE_BAND_FRACTION < DISTRIBUTED_MEDIUM_BAND_FRACTION);
const _: () = assert!(DISTRIBUTED_MEDIUM_BAND_FRACTION < DISTRIBUTED_SMALL_BAND_FRACTION);
