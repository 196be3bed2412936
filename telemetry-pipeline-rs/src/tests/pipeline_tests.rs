#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use oracle_sdk::ReasoningOracle;

    use crate::pipeline::{IngestError, IngestSummary, TelemetryPipeline};
    use crate::record::{AnalysisResult, Severity, StoredTelemetry, TelemetryRecord};
    use crate::repository::{InMemoryTelemetryRepository, RepositoryError, TelemetryRepository};
    use crate::tests::support::{analysis_reply, config, rate_limited, MockOracle};

    fn pipeline(repo: &Arc<InMemoryTelemetryRepository>, oracle: Option<MockOracle>) -> TelemetryPipeline {
        TelemetryPipeline::new(
            repo.clone(),
            oracle.map(|o| Arc::new(o) as Arc<dyn ReasoningOracle>),
            &config(),
        )
    }

    fn d1() -> TelemetryRecord {
        serde_json::from_str(r#"{"deviceId": "D1", "current": 120, "threshold": 50}"#).unwrap()
    }

    #[tokio::test]
    async fn exceeding_record_is_stored_as_critical() {
        let repo = Arc::new(InMemoryTelemetryRepository::new());
        let mut oracle = MockOracle::new();
        oracle
            .expect_complete()
            .times(1)
            .returning(|_| Ok(analysis_reply("CRITICAL")));

        let summary = pipeline(&repo, Some(oracle)).ingest(vec![d1()]).await.unwrap();

        assert_eq!(summary, IngestSummary { stored: 1, anomalies: 1 });
        let stored = repo.get(1).await.unwrap().unwrap();
        let analysis = stored.analysis.unwrap();
        assert_eq!(analysis.severity, Severity::Critical);
        assert!(analysis.is_threshold_exceeded);
    }

    #[tokio::test]
    async fn exceeding_record_without_oracle_uses_ratio() {
        let repo = Arc::new(InMemoryTelemetryRepository::new());

        pipeline(&repo, None).ingest(vec![d1()]).await.unwrap();

        let analysis = repo.get(1).await.unwrap().unwrap().analysis.unwrap();
        assert_eq!(analysis.severity, Severity::Critical);
        assert!(analysis.is_threshold_exceeded);
    }

    #[tokio::test]
    async fn readings_within_threshold_are_not_analyzed() {
        let repo = Arc::new(InMemoryTelemetryRepository::new());
        let mut oracle = MockOracle::new();
        oracle.expect_complete().times(0);

        let batch = vec![
            TelemetryRecord::new("D2").with_current(50.0),
            TelemetryRecord::new("D3").with_current(f64::NAN),
            TelemetryRecord::new("D4").with_temperature(95.0),
        ];
        let summary = pipeline(&repo, Some(oracle)).ingest(batch).await.unwrap();

        assert_eq!(summary, IngestSummary { stored: 3, anomalies: 0 });
        assert!(repo.recent_anomalies(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn negative_threshold_override_uses_pipeline_default() {
        let repo = Arc::new(InMemoryTelemetryRepository::new());
        let mut oracle = MockOracle::new();
        oracle.expect_complete().times(0);

        let record: TelemetryRecord =
            serde_json::from_str(r#"{"deviceId": "D5", "current": 10, "threshold": -5}"#).unwrap();
        let summary = pipeline(&repo, Some(oracle)).ingest(vec![record]).await.unwrap();

        assert_eq!(summary, IngestSummary { stored: 1, anomalies: 0 });
        assert!(repo.get(1).await.unwrap().unwrap().analysis.is_none());
    }

    #[tokio::test]
    async fn batch_rate_limit_calls_oracle_once() {
        let repo = Arc::new(InMemoryTelemetryRepository::new());
        let mut oracle = MockOracle::new();
        oracle.expect_complete().times(1).returning(|_| Err(rate_limited()));

        let batch = vec![
            TelemetryRecord::new("D1").with_current(120.0),
            TelemetryRecord::new("D2").with_current(60.0),
            TelemetryRecord::new("D3").with_current(10.0),
            TelemetryRecord::new("D4").with_current(75.0),
        ];
        let summary = pipeline(&repo, Some(oracle)).ingest(batch).await.unwrap();

        assert_eq!(summary, IngestSummary { stored: 4, anomalies: 3 });
        let mut severities = Vec::new();
        for id in [1, 2, 4] {
            let stored = repo.get(id).await.unwrap().unwrap();
            severities.push(stored.analysis.unwrap().severity);
        }
        assert_eq!(severities, vec![Severity::Critical, Severity::Warning, Severity::Warning]);
        assert!(repo.get(3).await.unwrap().unwrap().analysis.is_none());
    }

    struct BrokenRepository {
        fail_insert: bool,
        inner: InMemoryTelemetryRepository,
    }

    #[async_trait]
    impl TelemetryRepository for BrokenRepository {
        async fn insert_batch(&self, records: &[TelemetryRecord]) -> Result<Vec<StoredTelemetry>, RepositoryError> {
            if self.fail_insert {
                return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
            }
            self.inner.insert_batch(records).await
        }

        async fn attach_analysis(&self, id: i64, _analysis: &AnalysisResult) -> Result<(), RepositoryError> {
            Err(RepositoryError::NotFound(id))
        }

        async fn get(&self, id: i64) -> Result<Option<StoredTelemetry>, RepositoryError> {
            self.inner.get(id).await
        }

        async fn recent_anomalies(&self, limit: usize) -> Result<Vec<StoredTelemetry>, RepositoryError> {
            self.inner.recent_anomalies(limit).await
        }
    }

    #[tokio::test]
    async fn insert_failure_fails_the_batch() {
        let repo = Arc::new(BrokenRepository {
            fail_insert: true,
            inner: InMemoryTelemetryRepository::new(),
        });
        let pipeline = TelemetryPipeline::new(repo, None, &config());

        let err = pipeline.ingest(vec![d1()]).await.unwrap_err();
        assert!(matches!(err, IngestError::Persistence(_)));
    }

    #[tokio::test]
    async fn attach_failure_is_not_fatal() {
        let repo = Arc::new(BrokenRepository {
            fail_insert: false,
            inner: InMemoryTelemetryRepository::new(),
        });
        let pipeline = TelemetryPipeline::new(repo, None, &config());

        let summary = pipeline.ingest(vec![d1(), d1()]).await.unwrap();
        assert_eq!(summary, IngestSummary { stored: 2, anomalies: 2 });
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let repo = Arc::new(InMemoryTelemetryRepository::new());
        let summary = pipeline(&repo, None).ingest(Vec::new()).await.unwrap();
        assert_eq!(summary, IngestSummary::default());
        assert!(repo.is_empty().await);
    }
}
