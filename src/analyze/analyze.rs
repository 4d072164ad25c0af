use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::info;

use super::distributed::DistributedAnalyzer;
use super::error::{AnalyzeError, AnalyzeResult};
use super::local::LocalAnalyzer;
use super::metrics::{HealthResult, TableMetrics};
use super::options::{AnalysisOptions, DistributedHeuristics};
use super::table_analyzer::TableAnalyzer;
use crate::reader::delta::DeltaLogReader;
use crate::reader::engine::SqlSession;
use crate::reader::TableReader;
use crate::storage::{StorageConfig, StorageProvider, StorageProviderFactory};

/// Where table facts come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// The transaction log and files, read directly through storage.
    Local,
    /// A query engine's catalog and SQL surface.
    Distributed,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Local => "local",
            Backend::Distributed => "distributed",
        }
    }
}

impl Display for Backend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = AnalyzeError;

    /// Accepts `local` (or `python`) and `distributed` (or `databricks`, `spark`).
    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "local" | "python" => Ok(Backend::Local),
            "distributed" | "databricks" | "spark" => Ok(Backend::Distributed),
            _ => Err(AnalyzeError::config(format!(
                "unknown backend '{}', expected 'local' or 'distributed'",
                tag
            ))),
        }
    }
}

const PATH_PREFIXES: [&str; 5] = ["/", "s3://", "abfss://", "gs://", "file://"];

/// The table to analyze: a catalog name or a storage path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableIdentifier {
    Name(String),
    Path(String),
}

impl TableIdentifier {
    /// Paths are recognised by their prefix (`/`, `s3://`, `abfss://`,
    /// `gs://`, `file://`); anything else is a catalog name.
    ///
    /// ```
    /// use delta_pulse::analyze::TableIdentifier;
    ///
    /// assert_eq!(
    ///     TableIdentifier::parse("s3://lake/tips"),
    ///     TableIdentifier::Path("s3://lake/tips".to_string())
    /// );
    /// assert_eq!(
    ///     TableIdentifier::parse("main.sales.tips"),
    ///     TableIdentifier::Name("main.sales.tips".to_string())
    /// );
    /// ```
    pub fn parse(identifier: &str) -> Self {
        if PATH_PREFIXES.iter().any(|p| identifier.starts_with(p)) {
            TableIdentifier::Path(identifier.to_string())
        } else {
            TableIdentifier::Name(identifier.to_string())
        }
    }

    /// Exactly one of `name` and `path` must be given.
    pub fn from_parts(name: Option<&str>, path: Option<&str>) -> AnalyzeResult<Self> {
        match (name, path) {
            (Some(name), None) => Ok(TableIdentifier::Name(name.to_string())),
            (None, Some(path)) => Ok(TableIdentifier::Path(path.to_string())),
            (Some(_), Some(_)) => Err(AnalyzeError::config(
                "give either a table name or a table path, not both",
            )),
            (None, None) => Err(AnalyzeError::config(
                "either a table name or a table path is required",
            )),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TableIdentifier::Name(s) | TableIdentifier::Path(s) => s,
        }
    }
}

impl Display for TableIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Builder for constructing an `Analyzer` instance.
///
/// The local backend reads tables through storage. Without a storage
/// configuration it uses the local filesystem rooted at `/`, so absolute
/// paths work as they are. The distributed backend needs an engine session.
///
/// # Examples
///
/// ```no_run
/// use delta_pulse::analyze::{AnalysisOptions, Analyzer, Backend, TableIdentifier};
/// use delta_pulse::storage::StorageConfig;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
/// let analyzer = Analyzer::builder(Backend::Local)
///     .with_storage(StorageConfig::local().with_option("path", "/data"))
///     .with_options(AnalysisOptions::default().with_skew_threshold(0.2))
///     .build()
///     .await?;
///
/// let metrics = analyzer
///     .analyze(&TableIdentifier::Path("tips".to_string()))
///     .await?;
/// println!("{}", metrics);
/// # Ok(())
/// # }
/// ```
pub struct AnalyzerBuilder {
    backend: Backend,
    storage_config: Option<StorageConfig>,
    storage_provider: Option<Arc<dyn StorageProvider>>,
    table_reader: Option<Arc<dyn TableReader>>,
    session: Option<Arc<dyn SqlSession>>,
    options: AnalysisOptions,
    heuristics: DistributedHeuristics,
}

impl AnalyzerBuilder {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            storage_config: None,
            storage_provider: None,
            table_reader: None,
            session: None,
            options: AnalysisOptions::default(),
            heuristics: DistributedHeuristics::default(),
        }
    }

    /// Storage the local backend reads through.
    pub fn with_storage(mut self, config: StorageConfig) -> Self {
        self.storage_config = Some(config);
        self
    }

    /// An already built storage provider; takes precedence over [`Self::with_storage`].
    pub fn with_storage_provider(mut self, provider: Arc<dyn StorageProvider>) -> Self {
        self.storage_provider = Some(provider);
        self
    }

    /// Replace the built-in transaction log reader.
    pub fn with_table_reader(mut self, reader: Arc<dyn TableReader>) -> Self {
        self.table_reader = Some(reader);
        self
    }

    /// Engine session for the distributed backend.
    pub fn with_session(mut self, session: Arc<dyn SqlSession>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_options(mut self, options: AnalysisOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the number of concurrent per-file metadata requests.
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.options.parallelism = parallelism;
        self
    }

    pub fn with_heuristics(mut self, heuristics: DistributedHeuristics) -> Self {
        self.heuristics = heuristics;
        self
    }

    /// Builds the `Analyzer` instance.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid options or a distributed
    /// backend without a session, and a storage error if the storage provider
    /// cannot be initialized.
    pub async fn build(self) -> AnalyzeResult<Analyzer> {
        self.options.validate()?;

        let inner: Box<dyn TableAnalyzer> = match self.backend {
            Backend::Local => {
                let storage_provider = match (self.storage_provider, self.storage_config) {
                    (Some(provider), _) => provider,
                    (None, Some(config)) => StorageProviderFactory::from_config(config).await?,
                    (None, None) => StorageProviderFactory::filesystem_root().await?,
                };
                let table_reader = self.table_reader.unwrap_or_else(|| {
                    Arc::new(DeltaLogReader::new(Arc::clone(&storage_provider)))
                });
                Box::new(LocalAnalyzer::new(storage_provider, table_reader))
            }
            Backend::Distributed => {
                let session = self.session.ok_or_else(|| {
                    AnalyzeError::config("the distributed backend requires an engine session")
                })?;
                Box::new(DistributedAnalyzer::new(session, self.heuristics))
            }
        };

        Ok(Analyzer {
            inner,
            options: self.options,
        })
    }
}

/// Runs a backend against tables and scores the result.
pub struct Analyzer {
    inner: Box<dyn TableAnalyzer>,
    options: AnalysisOptions,
}

impl Analyzer {
    pub fn builder(backend: Backend) -> AnalyzerBuilder {
        AnalyzerBuilder::new(backend)
    }

    pub fn backend(&self) -> Backend {
        self.inner.backend()
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    /// Analyze `table` with the analyzer's thresholds. The returned metrics
    /// carry their health score and status.
    pub async fn analyze(&self, table: &TableIdentifier) -> AnalyzeResult<TableMetrics> {
        self.analyze_with_options(table, &self.options).await
    }

    /// Analyze `table` with thresholds for this call only.
    pub async fn analyze_with_options(
        &self,
        table: &TableIdentifier,
        options: &AnalysisOptions,
    ) -> AnalyzeResult<TableMetrics> {
        let analyze_start = SystemTime::now();
        info!("Analyzing table={}, backend={}", table, self.backend());

        let mut metrics = self.inner.analyze_table(table, options).await?;
        let (score, status) = metrics.calculate_health_score();

        info!(
            "Analyzed table={}, backend={}, health_score={:.1}, health_status={}, took={}",
            table,
            self.backend(),
            score,
            status,
            analyze_start.elapsed().unwrap_or_default().as_millis()
        );
        Ok(metrics)
    }

    /// [`Self::analyze`] wrapped into a [`HealthResult`] with an integer score.
    pub async fn analyze_with_health_result(
        &self,
        table: &TableIdentifier,
    ) -> AnalyzeResult<HealthResult> {
        self.analyze_with_health_result_and_options(table, &self.options)
            .await
    }

    /// [`Self::analyze_with_options`] wrapped into a [`HealthResult`].
    pub async fn analyze_with_health_result_and_options(
        &self,
        table: &TableIdentifier,
        options: &AnalysisOptions,
    ) -> AnalyzeResult<HealthResult> {
        Ok(HealthResult::from(
            self.analyze_with_options(table, options).await?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::metrics::HealthStatus;
    use crate::reader::engine::Row;
    use async_trait::async_trait;

    #[test]
    fn test_backend_from_str() {
        assert_eq!("local".parse::<Backend>().unwrap(), Backend::Local);
        assert_eq!("Python".parse::<Backend>().unwrap(), Backend::Local);
        assert_eq!("databricks".parse::<Backend>().unwrap(), Backend::Distributed);
        assert_eq!(" SPARK ".parse::<Backend>().unwrap(), Backend::Distributed);
        assert!(matches!(
            "duckdb".parse::<Backend>(),
            Err(AnalyzeError::Configuration(_))
        ));
        assert_eq!(Backend::Distributed.to_string(), "distributed");
    }

    #[test]
    fn test_table_identifier_parse() {
        for path in ["/mnt/tips", "s3://b/tips", "abfss://c@a/tips", "gs://b/t", "file:///t"] {
            assert!(matches!(TableIdentifier::parse(path), TableIdentifier::Path(_)));
        }
        assert_eq!(
            TableIdentifier::parse("tips"),
            TableIdentifier::Name("tips".to_string())
        );
    }

    #[test]
    fn test_table_identifier_from_parts() {
        assert_eq!(
            TableIdentifier::from_parts(Some("tips"), None).unwrap(),
            TableIdentifier::Name("tips".to_string())
        );
        assert_eq!(
            TableIdentifier::from_parts(None, Some("/t")).unwrap().as_str(),
            "/t"
        );
        assert!(TableIdentifier::from_parts(Some("a"), Some("/b")).is_err());
        assert!(TableIdentifier::from_parts(None, None).is_err());
    }

    #[tokio::test]
    async fn test_distributed_build_requires_session() {
        let err = Analyzer::builder(Backend::Distributed)
            .build()
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AnalyzeError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_build_rejects_invalid_options() {
        let result = Analyzer::builder(Backend::Local)
            .with_parallelism(0)
            .build()
            .await;
        assert!(result.is_err());
    }

    struct EmptyTableSession;

    #[async_trait]
    impl SqlSession for EmptyTableSession {
        async fn sql(&self, query: &str) -> AnalyzeResult<Vec<Row>> {
            let row = if query.starts_with("DESCRIBE DETAIL") {
                serde_json::json!({"location": "dbfs:/empty", "sizeInBytes": 0, "numFiles": 0})
            } else if query.starts_with("DESCRIBE HISTORY") {
                serde_json::json!({"version": 0, "operation": "CREATE TABLE"})
            } else {
                serde_json::json!({"pulse_row_count": 0})
            };
            Ok(row.as_object().cloned().into_iter().collect())
        }
    }

    #[tokio::test]
    async fn test_analyze_scores_and_wraps() {
        let analyzer = Analyzer::builder(Backend::Distributed)
            .with_session(Arc::new(EmptyTableSession))
            .build()
            .await
            .unwrap();
        assert_eq!(analyzer.backend(), Backend::Distributed);

        let table = TableIdentifier::Name("empty".to_string());
        let metrics = analyzer.analyze(&table).await.unwrap();
        assert_eq!(metrics.health_score(), Some(62.5));
        assert_eq!(metrics.health_status(), Some(HealthStatus::Unhealthy));

        let result = analyzer.analyze_with_health_result(&table).await.unwrap();
        assert_eq!(result.health_metric, 63);
        assert_eq!(result.health_status, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_health_result_uses_per_call_options() {
        let analyzer = Analyzer::builder(Backend::Distributed)
            .with_session(Arc::new(EmptyTableSession))
            .build()
            .await
            .unwrap();
        let table = TableIdentifier::Name("empty".to_string());

        let result = analyzer
            .analyze_with_health_result_and_options(
                &table,
                &AnalysisOptions::default().with_small_file_size_mb(None),
            )
            .await
            .unwrap();
        assert_eq!(result.health_metric, 63);

        let err = analyzer
            .analyze_with_health_result_and_options(
                &table,
                &AnalysisOptions::default().with_skew_threshold(-1.0),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzeError::Configuration(_)));
    }
}
