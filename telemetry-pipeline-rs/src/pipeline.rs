use std::sync::Arc;

use oracle_sdk::ReasoningOracle;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::analyzer::AnomalyAnalyzer;
use crate::circuit::OracleCircuit;
use crate::config::PipelineConfig;
use crate::record::{StoredTelemetry, TelemetryRecord};
use crate::repository::{RepositoryError, TelemetryRepository};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to persist telemetry batch: {0}")]
    Persistence(#[from] RepositoryError),
}

/// Outcome of one ingested batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IngestSummary {
    pub stored: usize,
    /// Records that exceeded their threshold and were analyzed
    pub anomalies: usize,
}

/// Persists telemetry batches and analyzes readings over threshold
pub struct TelemetryPipeline {
    repository: Arc<dyn TelemetryRepository>,
    analyzer: AnomalyAnalyzer,
}

impl TelemetryPipeline {
    pub fn new(
        repository: Arc<dyn TelemetryRepository>,
        oracle: Option<Arc<dyn ReasoningOracle>>,
        config: &PipelineConfig,
    ) -> Self {
        let circuit = Arc::new(OracleCircuit::new(config.cooldown));
        Self {
            repository,
            analyzer: AnomalyAnalyzer::new(oracle, circuit, config),
        }
    }

    pub fn analyzer(&self) -> &AnomalyAnalyzer {
        &self.analyzer
    }

    pub fn repository(&self) -> &Arc<dyn TelemetryRepository> {
        &self.repository
    }

    /// Store a batch, then analyze each exceeding record in order.
    ///
    /// Only the batch insert can fail the call. Analysis always produces a
    /// result, and a failure to attach it is logged and skipped.
    #[instrument(skip(self, batch), fields(batch_size = batch.len()))]
    pub async fn ingest(&self, batch: Vec<TelemetryRecord>) -> Result<IngestSummary, IngestError> {
        if batch.is_empty() {
            return Ok(IngestSummary::default());
        }

        let stored = self.repository.insert_batch(&batch).await.map_err(|e| {
            error!("Telemetry batch insert failed: {}", e);
            e
        })?;

        let mut anomalies = 0;
        for entry in &stored {
            let threshold = self.analyzer.threshold_for(&entry.record);
            if !entry.record.exceeds(threshold) {
                continue;
            }

            anomalies += 1;
            let analysis = self.analyzer.analyze(&entry.record).await;
            info!(
                "Record {} from {} analyzed as {}",
                entry.id, entry.record.device_id, analysis.severity
            );

            if let Err(e) = self.repository.attach_analysis(entry.id, &analysis).await {
                warn!("Could not attach analysis to record {}: {}", entry.id, e);
            }
        }

        Ok(IngestSummary {
            stored: stored.len(),
            anomalies,
        })
    }

    pub async fn recent_anomalies(&self, limit: usize) -> Result<Vec<StoredTelemetry>, RepositoryError> {
        self.repository.recent_anomalies(limit).await
    }
}
