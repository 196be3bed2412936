// Persistence for telemetry records and their analyses.
//
// Records are inserted once per batch inside a single transaction. An
// analysis is attached at most once and never changed afterward.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use structured_store::TELEMETRY_TABLE;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::RepositoryBackend;
use crate::record::{AnalysisResult, Severity, StoredTelemetry, TelemetryRecord};

/// Repository error type.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("record not found: {0}")]
    NotFound(i64),

    #[error("record {0} already has an analysis")]
    AlreadyAnalyzed(i64),
}

#[async_trait]
pub trait TelemetryRepository: Send + Sync {
    /// Persist a batch atomically, returning the records with their ids
    /// in input order.
    async fn insert_batch(
        &self,
        records: &[TelemetryRecord],
    ) -> Result<Vec<StoredTelemetry>, RepositoryError>;

    async fn attach_analysis(
        &self,
        id: i64,
        analysis: &AnalysisResult,
    ) -> Result<(), RepositoryError>;

    async fn get(&self, id: i64) -> Result<Option<StoredTelemetry>, RepositoryError>;

    /// Most recently analyzed records first
    async fn recent_anomalies(
        &self,
        limit: usize,
    ) -> Result<Vec<StoredTelemetry>, RepositoryError>;
}

/// Build the repository selected by configuration
pub async fn create_repository(
    backend: &RepositoryBackend,
) -> Result<Arc<dyn TelemetryRepository>, RepositoryError> {
    match backend {
        RepositoryBackend::Memory => {
            info!("Using in-memory telemetry repository");
            Ok(Arc::new(InMemoryTelemetryRepository::new()))
        }
        RepositoryBackend::Postgres { database_url } => {
            let repository = PostgresTelemetryRepository::connect(database_url).await?;
            repository.initialize().await?;
            Ok(Arc::new(repository))
        }
    }
}

/// Process-local repository for development and tests
#[derive(Default)]
pub struct InMemoryTelemetryRepository {
    records: RwLock<Vec<StoredTelemetry>>,
}

impl InMemoryTelemetryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl TelemetryRepository for InMemoryTelemetryRepository {
    async fn insert_batch(
        &self,
        records: &[TelemetryRecord],
    ) -> Result<Vec<StoredTelemetry>, RepositoryError> {
        let mut stored = self.records.write().await;
        let first_id = stored.len() as i64 + 1;

        let inserted: Vec<StoredTelemetry> = records
            .iter()
            .enumerate()
            .map(|(offset, record)| StoredTelemetry {
                id: first_id + offset as i64,
                record: record.clone(),
                analysis: None,
            })
            .collect();

        stored.extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn attach_analysis(
        &self,
        id: i64,
        analysis: &AnalysisResult,
    ) -> Result<(), RepositoryError> {
        let mut stored = self.records.write().await;
        let entry = stored
            .iter_mut()
            .find(|entry| entry.id == id)
            .ok_or(RepositoryError::NotFound(id))?;

        if entry.analysis.is_some() {
            return Err(RepositoryError::AlreadyAnalyzed(id));
        }
        entry.analysis = Some(analysis.clone());
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<Option<StoredTelemetry>, RepositoryError> {
        let stored = self.records.read().await;
        Ok(stored.iter().find(|entry| entry.id == id).cloned())
    }

    async fn recent_anomalies(
        &self,
        limit: usize,
    ) -> Result<Vec<StoredTelemetry>, RepositoryError> {
        let stored = self.records.read().await;
        let mut analyzed: Vec<StoredTelemetry> = stored
            .iter()
            .filter(|entry| entry.analysis.is_some())
            .cloned()
            .collect();

        analyzed.sort_by(|a, b| {
            let at = |entry: &StoredTelemetry| entry.analysis.as_ref().map(|r| r.analysis_timestamp);
            at(b).cmp(&at(a)).then(b.id.cmp(&a.id))
        });
        analyzed.truncate(limit);
        Ok(analyzed)
    }
}

/// Postgres-backed repository writing the table the query engine reads
pub struct PostgresTelemetryRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct TelemetryRow {
    id: i64,
    device_id: String,
    timestamp: DateTime<Utc>,
    temperature: Option<f64>,
    gas: Option<f64>,
    current: Option<f64>,
    voltage: Option<f64>,
    threshold: Option<f64>,
    severity: Option<String>,
    possible_cause: Option<String>,
    recommendation: Option<String>,
    is_threshold_exceeded: bool,
    analysis_timestamp: Option<DateTime<Utc>>,
}

impl From<TelemetryRow> for StoredTelemetry {
    fn from(row: TelemetryRow) -> Self {
        let analysis = match (row.severity, row.analysis_timestamp) {
            (Some(severity), Some(analysis_timestamp)) => Some(AnalysisResult {
                severity: Severity::parse(&severity),
                possible_cause: row.possible_cause.unwrap_or_default(),
                recommendation: row.recommendation.unwrap_or_default(),
                is_threshold_exceeded: row.is_threshold_exceeded,
                analysis_timestamp,
            }),
            _ => None,
        };

        StoredTelemetry {
            id: row.id,
            record: TelemetryRecord {
                device_id: row.device_id,
                timestamp: row.timestamp,
                temperature: row.temperature,
                gas: row.gas,
                current: row.current,
                voltage: row.voltage,
                threshold: row.threshold,
            },
            analysis,
        }
    }
}

const SELECT_COLUMNS: &str = "id, device_id, timestamp, temperature, gas, current, voltage, \
threshold, severity, possible_cause, recommendation, is_threshold_exceeded, analysis_timestamp";

impl PostgresTelemetryRepository {
    pub async fn connect(database_url: &str) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the telemetry table if it does not exist yet
    pub async fn initialize(&self) -> Result<(), RepositoryError> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id BIGSERIAL PRIMARY KEY,
                device_id TEXT NOT NULL,
                timestamp TIMESTAMPTZ NOT NULL,
                temperature DOUBLE PRECISION,
                gas DOUBLE PRECISION,
                current DOUBLE PRECISION,
                voltage DOUBLE PRECISION,
                threshold DOUBLE PRECISION,
                severity TEXT,
                possible_cause TEXT,
                recommendation TEXT,
                is_threshold_exceeded BOOLEAN NOT NULL DEFAULT FALSE,
                analysis_timestamp TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
            TELEMETRY_TABLE
        );
        sqlx::query(&ddl).execute(&self.pool).await?;
        info!("Telemetry table {} ready", TELEMETRY_TABLE);
        Ok(())
    }
}

#[async_trait]
impl TelemetryRepository for PostgresTelemetryRepository {
    async fn insert_batch(
        &self,
        records: &[TelemetryRecord],
    ) -> Result<Vec<StoredTelemetry>, RepositoryError> {
        let statement = format!(
            "INSERT INTO {} (device_id, timestamp, temperature, gas, current, voltage, threshold) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
            TELEMETRY_TABLE
        );

        let mut tx = self.pool.begin().await?;
        let mut stored = Vec::with_capacity(records.len());

        for record in records {
            let (id,): (i64,) = sqlx::query_as(&statement)
                .bind(&record.device_id)
                .bind(record.timestamp)
                .bind(record.temperature)
                .bind(record.gas)
                .bind(record.current)
                .bind(record.voltage)
                .bind(record.threshold)
                .fetch_one(&mut *tx)
                .await?;

            stored.push(StoredTelemetry {
                id,
                record: record.clone(),
                analysis: None,
            });
        }

        tx.commit().await?;
        Ok(stored)
    }

    async fn attach_analysis(
        &self,
        id: i64,
        analysis: &AnalysisResult,
    ) -> Result<(), RepositoryError> {
        let statement = format!(
            "UPDATE {} SET severity = $2, possible_cause = $3, recommendation = $4, \
             is_threshold_exceeded = $5, analysis_timestamp = $6 \
             WHERE id = $1 AND severity IS NULL",
            TELEMETRY_TABLE
        );

        let result = sqlx::query(&statement)
            .bind(id)
            .bind(analysis.severity.as_str())
            .bind(&analysis.possible_cause)
            .bind(&analysis.recommendation)
            .bind(analysis.is_threshold_exceeded)
            .bind(analysis.analysis_timestamp)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        match self.get(id).await? {
            Some(_) => Err(RepositoryError::AlreadyAnalyzed(id)),
            None => Err(RepositoryError::NotFound(id)),
        }
    }

    async fn get(&self, id: i64) -> Result<Option<StoredTelemetry>, RepositoryError> {
        let statement = format!("SELECT {} FROM {} WHERE id = $1", SELECT_COLUMNS, TELEMETRY_TABLE);
        let row: Option<TelemetryRow> = sqlx::query_as(&statement)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(StoredTelemetry::from))
    }

    async fn recent_anomalies(
        &self,
        limit: usize,
    ) -> Result<Vec<StoredTelemetry>, RepositoryError> {
        let statement = format!(
            "SELECT {} FROM {} WHERE severity IS NOT NULL \
             ORDER BY analysis_timestamp DESC, id DESC LIMIT $1",
            SELECT_COLUMNS, TELEMETRY_TABLE
        );
        let rows: Vec<TelemetryRow> = sqlx::query_as(&statement)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(StoredTelemetry::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(severity: Severity) -> AnalysisResult {
        AnalysisResult {
            severity,
            possible_cause: "Overload".into(),
            recommendation: "Inspect".into(),
            is_threshold_exceeded: true,
            analysis_timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn ids_follow_input_order() {
        let repo = InMemoryTelemetryRepository::new();
        let first = repo
            .insert_batch(&[TelemetryRecord::new("D1"), TelemetryRecord::new("D2")])
            .await
            .unwrap();
        let second = repo.insert_batch(&[TelemetryRecord::new("D3")]).await.unwrap();

        assert_eq!(first.iter().map(|s| s.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(first[1].record.device_id, "D2");
        assert_eq!(second[0].id, 3);
        assert_eq!(repo.len().await, 3);
    }

    #[tokio::test]
    async fn analysis_attaches_once() {
        let repo = InMemoryTelemetryRepository::new();
        repo.insert_batch(&[TelemetryRecord::new("D1")]).await.unwrap();

        repo.attach_analysis(1, &analysis(Severity::Critical)).await.unwrap();
        let err = repo.attach_analysis(1, &analysis(Severity::Normal)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::AlreadyAnalyzed(1)));

        let stored = repo.get(1).await.unwrap().unwrap();
        assert_eq!(stored.analysis.unwrap().severity, Severity::Critical);

        let err = repo.attach_analysis(9, &analysis(Severity::Normal)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(9)));
    }

    #[tokio::test]
    async fn recent_anomalies_only_lists_analyzed() {
        let repo = InMemoryTelemetryRepository::new();
        repo.insert_batch(&[
            TelemetryRecord::new("D1"),
            TelemetryRecord::new("D2"),
            TelemetryRecord::new("D3"),
        ])
        .await
        .unwrap();
        repo.attach_analysis(1, &analysis(Severity::Warning)).await.unwrap();
        repo.attach_analysis(3, &analysis(Severity::Critical)).await.unwrap();

        let recent = repo.recent_anomalies(10).await.unwrap();
        let mut ids: Vec<i64> = recent.iter().map(|s| s.id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 3]);

        assert_eq!(repo.recent_anomalies(1).await.unwrap().len(), 1);
    }

    #[test]
    fn row_without_analysis_maps_to_none() {
        let row = TelemetryRow {
            id: 4,
            device_id: "D4".into(),
            timestamp: Utc::now(),
            temperature: Some(21.5),
            gas: None,
            current: Some(12.0),
            voltage: None,
            threshold: None,
            severity: None,
            possible_cause: None,
            recommendation: None,
            is_threshold_exceeded: false,
            analysis_timestamp: None,
        };

        let stored = StoredTelemetry::from(row);
        assert_eq!(stored.id, 4);
        assert_eq!(stored.record.current, Some(12.0));
        assert!(stored.analysis.is_none());
    }
}
