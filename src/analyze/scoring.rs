//! Health scoring.
//!
//! The overall score is the sum of four components worth up to 25 points
//! each: freshness, maintenance, balance and storage.

use serde::{Deserialize, Serialize};

use super::constants::*;
use super::metrics::{HealthStatus, TableMetrics};

/// Full credit at ten writes, linear below.
pub fn freshness_score(writes: u64) -> f64 {
    (writes as f64 / FRESHNESS_WRITE_TARGET).min(1.0) * COMPONENT_MAX_SCORE
}

/// Half of the maintenance band; full credit at one optimize per ten writes.
pub fn optimize_score(writes: u64, optimizes: u64) -> f64 {
    let ratio = optimizes as f64 / writes.max(1) as f64;
    (ratio * OPTIMIZE_RATIO_MULTIPLIER).min(1.0) * (COMPONENT_MAX_SCORE / 2.0)
}

/// Other half of the maintenance band.
pub fn vacuum_score(needs_vacuum: bool) -> f64 {
    if needs_vacuum {
        0.0
    } else {
        COMPONENT_MAX_SCORE / 2.0
    }
}

pub fn balance_score(skewness_max: f64) -> f64 {
    COMPONENT_MAX_SCORE - (skewness_max * SKEW_PENALTY_MULTIPLIER).min(COMPONENT_MAX_SCORE)
}

/// Small files are weighed against two per write; orphans cost half the band.
pub fn storage_score(small_files_count: u64, writes: u64, has_orphan_files: bool) -> f64 {
    let half = COMPONENT_MAX_SCORE / 2.0;
    let small_files_ratio = small_files_count as f64 / (writes.saturating_mul(2)).max(1) as f64;
    let small_files_penalty = (small_files_ratio * half).min(half);
    let orphan_penalty = if has_orphan_files { half } else { 0.0 };
    COMPONENT_MAX_SCORE - small_files_penalty - orphan_penalty
}

pub fn status_for_score(score: f64) -> HealthStatus {
    if score >= HEALTHY_SCORE_THRESHOLD {
        HealthStatus::Healthy
    } else if score >= UNHEALTHY_SCORE_THRESHOLD {
        HealthStatus::Unhealthy
    } else {
        HealthStatus::VeryUnhealthy
    }
}

/// The component scores behind an overall health score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthScoreBreakdown {
    pub freshness: f64,
    pub optimize: f64,
    pub vacuum: f64,
    pub maintenance: f64,
    pub balance: f64,
    pub storage: f64,
    pub overall: f64,
}

impl HealthScoreBreakdown {
    pub fn compute(metrics: &TableMetrics) -> Self {
        let writes = metrics.number_of_writes;
        let skewness = metrics
            .skew_metrics
            .as_ref()
            .map(|skew| skew.skewness_max)
            .unwrap_or(metrics.skewness_max);

        let freshness = freshness_score(writes);
        let optimize = optimize_score(writes, metrics.number_of_optimizes);
        let vacuum = vacuum_score(metrics.needs_vacuum);
        let maintenance = optimize + vacuum;
        let balance = balance_score(skewness);
        let storage = storage_score(metrics.small_files_count, writes, metrics.has_orphan_files);

        Self {
            freshness,
            optimize,
            vacuum,
            maintenance,
            balance,
            storage,
            overall: freshness + maintenance + balance + storage,
        }
    }

    pub fn status(&self) -> HealthStatus {
        status_for_score(self.overall)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freshness_is_monotonic_and_capped() {
        let mut previous = 0.0;
        for writes in 0..20 {
            let score = freshness_score(writes);
            assert!(score >= previous);
            previous = score;
        }
        assert_eq!(freshness_score(0), 0.0);
        assert_eq!(freshness_score(4), 10.0);
        assert_eq!(freshness_score(10), 25.0);
        assert_eq!(freshness_score(1000), 25.0);
    }

    #[test]
    fn test_optimize_score() {
        assert_eq!(optimize_score(0, 0), 0.0);
        assert_eq!(optimize_score(10, 1), 12.5);
        assert!((optimize_score(20, 1) - 6.25).abs() < 1e-9);
        assert_eq!(optimize_score(2, 5), 12.5);
    }

    #[test]
    fn test_zero_activity_maintenance() {
        assert_eq!(optimize_score(0, 0) + vacuum_score(false), 12.5);
        assert_eq!(vacuum_score(true), 0.0);
    }

    #[test]
    fn test_balance_score() {
        assert_eq!(balance_score(0.0), 25.0);
        assert!((balance_score(0.1) - 15.0).abs() < 1e-9);
        assert_eq!(balance_score(0.9167), 0.0);
    }

    #[test]
    fn test_storage_score() {
        assert_eq!(storage_score(0, 0, false), 25.0);
        assert_eq!(storage_score(2, 2, false), 25.0 - 6.25);
        assert_eq!(storage_score(100, 1, true), 0.0);
    }

    #[test]
    fn test_status_bands() {
        assert_eq!(status_for_score(100.0), HealthStatus::Healthy);
        assert_eq!(status_for_score(80.0), HealthStatus::Healthy);
        assert_eq!(status_for_score(79.9), HealthStatus::Unhealthy);
        assert_eq!(status_for_score(50.0), HealthStatus::Unhealthy);
        assert_eq!(status_for_score(49.9), HealthStatus::VeryUnhealthy);
    }

    #[test]
    fn test_breakdown_of_untouched_table() {
        let breakdown = HealthScoreBreakdown::compute(&TableMetrics::default());
        assert_eq!(breakdown.freshness, 0.0);
        assert_eq!(breakdown.maintenance, 12.5);
        assert_eq!(breakdown.balance, 25.0);
        assert_eq!(breakdown.storage, 25.0);
        assert_eq!(breakdown.overall, 62.5);
        assert_eq!(breakdown.status(), HealthStatus::Unhealthy);
    }
}
