//! Anomaly characterization for readings above their current threshold.
//!
//! The oracle is asked for a severity, a probable cause and a
//! recommendation. Every oracle problem (missing, blocked, slow, failing,
//! unparseable) degrades to a deterministic result so ingestion never
//! depends on the oracle being healthy.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use oracle_sdk::util::parse_json_object;
use oracle_sdk::{OracleRequest, ReasoningOracle, ServiceError};
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::circuit::OracleCircuit;
use crate::config::{BlockedPolicy, PipelineConfig};
use crate::record::{AnalysisResult, Severity, TelemetryRecord};

const ANALYSIS_SYSTEM_PROMPT: &str = "You are an industrial equipment monitoring assistant. \
Characterize anomalous device readings. Respond with a JSON object only.";

pub const BLOCKED_CAUSE: &str = "Reasoning oracle blocked (rate limited)";
pub const BLOCKED_RECOMMENDATION: &str = "Wait for the oracle cool-down and re-analyze if needed";
const UNKNOWN_CAUSE: &str = "oracle blocked";
const UNKNOWN_RECOMMENDATION: &str = "wait";
const INCOMPLETE_CAUSE: &str = "Analysis incomplete";
const INCOMPLETE_RECOMMENDATION: &str = "Manual inspection required";

/// Why the oracle's answer was not used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Degradation {
    NotConfigured,
    Timeout,
    RateLimited,
    Failed,
    Malformed,
}

impl Degradation {
    fn cause(&self) -> &'static str {
        match self {
            Degradation::NotConfigured => "reasoning oracle not configured",
            Degradation::Timeout => "reasoning oracle timed out",
            Degradation::RateLimited => "reasoning oracle rate limited",
            Degradation::Failed => "reasoning oracle unavailable",
            Degradation::Malformed => "reasoning oracle reply unreadable",
        }
    }
}

pub struct AnomalyAnalyzer {
    oracle: Option<Arc<dyn ReasoningOracle>>,
    circuit: Arc<OracleCircuit>,
    default_threshold: f64,
    oracle_timeout: Duration,
    blocked_policy: BlockedPolicy,
}

impl AnomalyAnalyzer {
    pub fn new(
        oracle: Option<Arc<dyn ReasoningOracle>>,
        circuit: Arc<OracleCircuit>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            oracle,
            circuit,
            default_threshold: config.current_threshold,
            oracle_timeout: config.oracle_timeout,
            blocked_policy: config.blocked_policy,
        }
    }

    pub fn circuit(&self) -> &OracleCircuit {
        &self.circuit
    }

    /// Threshold for a record, honoring its own override
    pub fn threshold_for(&self, record: &TelemetryRecord) -> f64 {
        record.effective_threshold(self.default_threshold)
    }

    /// Characterize one record. Never fails.
    #[instrument(skip(self, record), fields(device_id = %record.device_id))]
    pub async fn analyze(&self, record: &TelemetryRecord) -> AnalysisResult {
        let threshold = self.threshold_for(record);

        let Some(oracle) = &self.oracle else {
            return fallback(record, threshold, Degradation::NotConfigured);
        };

        if !self.circuit.try_acquire() {
            debug!("Oracle circuit open, applying {:?} policy", self.blocked_policy);
            return blocked(record, threshold, self.blocked_policy);
        }

        let request = OracleRequest::prompt(analysis_prompt(record, threshold))
            .with_system(ANALYSIS_SYSTEM_PROMPT)
            .with_temperature(0.0);

        let reply = match tokio::time::timeout(self.oracle_timeout, oracle.complete(request)).await {
            Err(_) => {
                warn!("Oracle analysis exceeded {:?}", self.oracle_timeout);
                self.circuit.record_failure();
                return fallback(record, threshold, Degradation::Timeout);
            }
            Ok(Err(e)) => return self.degrade_on_error(record, threshold, e),
            Ok(Ok(reply)) => {
                self.circuit.record_success();
                reply
            }
        };

        let parsed = reply
            .content
            .as_deref()
            .ok_or_else(|| ServiceError::parsing("Oracle reply carried no text content"))
            .and_then(parse_json_object);

        match parsed {
            Ok(object) => from_oracle(&object, record, threshold),
            Err(e) => {
                warn!("Discarding oracle analysis: {}", e);
                fallback(record, threshold, Degradation::Malformed)
            }
        }
    }

    fn degrade_on_error(&self, record: &TelemetryRecord, threshold: f64, error: ServiceError) -> AnalysisResult {
        if error.is_rate_limited() {
            self.circuit.trip();
            return fallback(record, threshold, Degradation::RateLimited);
        }

        warn!("Oracle analysis failed: {}", error);
        self.circuit.record_failure();
        fallback(record, threshold, Degradation::Failed)
    }
}

fn analysis_prompt(record: &TelemetryRecord, threshold: f64) -> String {
    let reading = serde_json::to_string(record).unwrap_or_else(|_| format!("{:?}", record));
    format!(
        "A device reading exceeded its current threshold of {threshold}.\n\
         Reading: {reading}\n\n\
         Severity tiers:\n\
         - CRITICAL: current more than 50% over the threshold, or temperature above 80°C\n\
         - WARNING: current 10-50% over the threshold, or temperature between 60°C and 80°C\n\
         - NORMAL: otherwise\n\n\
         Respond with JSON: {{\"severity\": \"CRITICAL|WARNING|NORMAL\", \
         \"possibleCause\": \"...\", \"recommendation\": \"...\"}}"
    )
}

/// Severity tier from the exceedance ratio alone.
///
/// Strictly above 1.5 is CRITICAL, strictly above 1.0 is WARNING. A
/// missing or NaN current, or a ratio that cannot be computed, is NORMAL.
pub fn severity_from_ratio(current: Option<f64>, threshold: f64) -> Severity {
    let Some(current) = current else {
        return Severity::Normal;
    };

    let ratio = current / threshold;
    if ratio > 1.5 {
        Severity::Critical
    } else if ratio > 1.0 {
        Severity::Warning
    } else {
        Severity::Normal
    }
}

fn recommendation_for(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "Isolate the device and inspect it immediately",
        Severity::Warning => "Schedule an inspection and monitor the device closely",
        Severity::Normal | Severity::Unknown => "No action required; continue monitoring",
    }
}

/// Deterministic result used whenever the oracle's answer is unavailable
fn fallback(record: &TelemetryRecord, threshold: f64, reason: Degradation) -> AnalysisResult {
    let severity = severity_from_ratio(record.current, threshold);
    let possible_cause = match record.current {
        Some(current) if current.is_finite() => format!(
            "Current {} against threshold {} ({})",
            current,
            threshold,
            reason.cause()
        ),
        _ => format!("No usable current reading ({})", reason.cause()),
    };

    AnalysisResult {
        severity,
        possible_cause,
        recommendation: recommendation_for(severity).to_string(),
        is_threshold_exceeded: record.exceeds(threshold),
        analysis_timestamp: Utc::now(),
    }
}

fn blocked(record: &TelemetryRecord, threshold: f64, policy: BlockedPolicy) -> AnalysisResult {
    let (severity, possible_cause, recommendation) = match policy {
        BlockedPolicy::Fallback => (
            severity_from_ratio(record.current, threshold),
            BLOCKED_CAUSE,
            BLOCKED_RECOMMENDATION,
        ),
        BlockedPolicy::Unknown => (Severity::Unknown, UNKNOWN_CAUSE, UNKNOWN_RECOMMENDATION),
    };

    AnalysisResult {
        severity,
        possible_cause: possible_cause.to_string(),
        recommendation: recommendation.to_string(),
        is_threshold_exceeded: record.exceeds(threshold),
        analysis_timestamp: Utc::now(),
    }
}

// Missing fields default; an unrecognized severity is UNKNOWN.
fn from_oracle(object: &Map<String, Value>, record: &TelemetryRecord, threshold: f64) -> AnalysisResult {
    let field = |keys: &[&str]| {
        keys.iter()
            .find_map(|key| object.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    AnalysisResult {
        severity: field(&["severity"])
            .map(|s| Severity::parse(&s))
            .unwrap_or(Severity::Unknown),
        possible_cause: field(&["possibleCause", "possible_cause", "cause"])
            .unwrap_or_else(|| INCOMPLETE_CAUSE.to_string()),
        recommendation: field(&["recommendation", "recommendations"])
            .unwrap_or_else(|| INCOMPLETE_RECOMMENDATION.to_string()),
        is_threshold_exceeded: record.exceeds(threshold),
        analysis_timestamp: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(current: f64) -> TelemetryRecord {
        TelemetryRecord::new("D1").with_current(current)
    }

    #[test]
    fn ratio_boundaries() {
        assert_eq!(severity_from_ratio(Some(75.0), 50.0), Severity::Warning);
        assert_eq!(severity_from_ratio(Some(75.01), 50.0), Severity::Critical);
        assert_eq!(severity_from_ratio(Some(100.0), 50.0), Severity::Critical);
        assert_eq!(severity_from_ratio(Some(60.0), 50.0), Severity::Warning);
        assert_eq!(severity_from_ratio(Some(55.0), 50.0), Severity::Warning);
        assert_eq!(severity_from_ratio(Some(54.9), 50.0), Severity::Warning);
        assert_eq!(severity_from_ratio(Some(55.1), 50.0), Severity::Warning);
        assert_eq!(severity_from_ratio(Some(50.01), 50.0), Severity::Warning);
        assert_eq!(severity_from_ratio(Some(50.0), 50.0), Severity::Normal);
        assert_eq!(severity_from_ratio(Some(10.0), 50.0), Severity::Normal);
    }

    #[test]
    fn unusable_current_is_normal() {
        assert_eq!(severity_from_ratio(None, 50.0), Severity::Normal);
        assert_eq!(severity_from_ratio(Some(f64::NAN), 50.0), Severity::Normal);
    }

    #[test]
    fn fallback_marks_exceedance() {
        let result = fallback(&reading(120.0), 50.0, Degradation::Failed);
        assert_eq!(result.severity, Severity::Critical);
        assert!(result.is_threshold_exceeded);
        assert!(result.possible_cause.contains("120"));

        let nan = fallback(&reading(f64::NAN), 50.0, Degradation::Timeout);
        assert_eq!(nan.severity, Severity::Normal);
        assert!(!nan.is_threshold_exceeded);
    }

    #[test]
    fn blocked_policies() {
        let record = reading(80.0);

        let fallback = blocked(&record, 50.0, BlockedPolicy::Fallback);
        assert_eq!(fallback.severity, Severity::Critical);
        assert_eq!(fallback.possible_cause, BLOCKED_CAUSE);
        assert_eq!(fallback.recommendation, BLOCKED_RECOMMENDATION);

        let unknown = blocked(&record, 50.0, BlockedPolicy::Unknown);
        assert_eq!(unknown.severity, Severity::Unknown);
        assert_eq!(unknown.possible_cause, "oracle blocked");
        assert_eq!(unknown.recommendation, "wait");
    }

    #[test]
    fn oracle_fields_are_defaulted() {
        let object = parse_json_object("```json\n{\"severity\": \"warning\"}\n```").unwrap();
        let result = from_oracle(&object, &reading(60.0), 50.0);
        assert_eq!(result.severity, Severity::Warning);
        assert_eq!(result.possible_cause, "Analysis incomplete");
        assert_eq!(result.recommendation, "Manual inspection required");

        let object = parse_json_object("{\"severity\": \"apocalyptic\", \"possible_cause\": \"Short\"}").unwrap();
        let result = from_oracle(&object, &reading(60.0), 50.0);
        assert_eq!(result.severity, Severity::Unknown);
        assert_eq!(result.possible_cause, "Short");
    }

    #[test]
    fn prompt_carries_tiers_and_reading() {
        let prompt = analysis_prompt(&reading(120.0), 50.0);
        assert!(prompt.contains("threshold of 50"));
        assert!(prompt.contains("\"deviceId\":\"D1\""));
        assert!(prompt.contains("CRITICAL: current more than 50% over the threshold"));
        assert!(prompt.contains("temperature above 80°C"));
    }
}
