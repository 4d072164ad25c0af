use async_trait::async_trait;
use std::time::SystemTime;
use tracing::{info, warn};

use super::analyze::{Backend, TableIdentifier};
use super::error::{AnalyzeResult, MetricError};
use super::metrics::TableMetrics;
use super::options::AnalysisOptions;

/// One way of measuring a table.
///
/// Each backend sources the same [`TableMetrics`] from a different place: the
/// local backend reads the transaction log and the files through storage, the
/// distributed backend asks a query engine. The `Analyzer` picks one and
/// scores whatever it returns, so backends leave the health verdict unset.
#[async_trait]
pub trait TableAnalyzer: Send + Sync {
    fn backend(&self) -> Backend;

    /// Measure `table`. Failures of individual metric groups are absorbed;
    /// only errors that make the whole analysis meaningless are returned.
    async fn analyze_table(
        &self,
        table: &TableIdentifier,
        options: &AnalysisOptions,
    ) -> AnalyzeResult<TableMetrics>;
}

/// Unwrap a stage result, falling back to the stage's safe default on failure.
pub(crate) fn recover<T: Default>(result: Result<T, MetricError>) -> T {
    recover_with(result, |_| T::default())
}

/// Like [`recover`] with a fallback built from the failure.
pub(crate) fn recover_with<T>(
    result: Result<T, MetricError>,
    fallback: impl FnOnce(&MetricError) -> T,
) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            warn!("{}, using defaults, stage={}", e, e.stage);
            fallback(&e)
        }
    }
}

/// Log the duration of a finished stage.
pub(crate) fn log_stage(stage: &str, table: &str, start: SystemTime) {
    info!(
        "Finished stage={}, table={}, took={}",
        stage,
        table,
        start.elapsed().unwrap_or_default().as_millis()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::error::MetricStage;

    #[test]
    fn test_recover_passes_values_through() {
        assert_eq!(recover::<u64>(Ok(7)), 7);
    }

    #[test]
    fn test_recover_falls_back_to_default() {
        let failed: Result<u64, MetricError> =
            Err(MetricError::new(MetricStage::RecordCount, "no statistics"));
        assert_eq!(recover(failed), 0);
    }

    #[test]
    fn test_recover_with_sees_the_failure() {
        let failed: Result<String, MetricError> =
            Err(MetricError::new(MetricStage::Skew, "boom"));
        let value = recover_with(failed, |e| e.message.clone());
        assert_eq!(value, "boom");
    }
}
