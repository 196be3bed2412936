//! Telemetry ingestion with oracle-assisted anomaly analysis.
//!
//! Batches are persisted first; readings whose current exceeds the
//! threshold are then characterized one at a time behind a shared
//! circuit that backs off after the oracle rate limits.

pub mod analyzer;
pub mod circuit;
pub mod config;
pub mod pipeline;
pub mod record;
pub mod repository;

#[cfg(test)]
mod tests;

pub use analyzer::{severity_from_ratio, AnomalyAnalyzer};
pub use circuit::{CircuitState, OracleCircuit};
pub use config::{BlockedPolicy, PipelineConfig, RepositoryBackend};
pub use pipeline::{IngestError, IngestSummary, TelemetryPipeline};
pub use record::{AnalysisResult, Severity, StoredTelemetry, TelemetryRecord};
pub use repository::{
    create_repository, InMemoryTelemetryRepository, PostgresTelemetryRepository, RepositoryError,
    TelemetryRepository,
};
