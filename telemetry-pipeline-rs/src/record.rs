use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One device reading as received
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryRecord {
    #[serde(alias = "device_id")]
    pub device_id: String,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub gas: Option<f64>,
    #[serde(default)]
    pub current: Option<f64>,
    #[serde(default)]
    pub voltage: Option<f64>,

    /// Overrides the pipeline's current threshold for this reading
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

impl TelemetryRecord {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            timestamp: Utc::now(),
            temperature: None,
            gas: None,
            current: None,
            voltage: None,
            threshold: None,
        }
    }

    pub fn with_current(mut self, current: f64) -> Self {
        self.current = Some(current);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Threshold applying to this record. An override that is not a
    /// positive finite number is ignored.
    pub fn effective_threshold(&self, default: f64) -> f64 {
        self.threshold
            .filter(|t| t.is_finite() && *t > 0.0)
            .unwrap_or(default)
    }

    /// Missing or NaN current never exceeds
    pub fn exceeds(&self, threshold: f64) -> bool {
        matches!(self.current, Some(current) if current > threshold)
    }
}

/// Anomaly severity tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    Warning,
    Normal,
    Unknown,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::Warning => "WARNING",
            Severity::Normal => "NORMAL",
            Severity::Unknown => "UNKNOWN",
        }
    }

    /// Case-insensitive; anything unrecognized is `Unknown`
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "CRITICAL" => Severity::Critical,
            "WARNING" => Severity::Warning,
            "NORMAL" => Severity::Normal,
            _ => Severity::Unknown,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Characterization of a reading that exceeded its threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub severity: Severity,
    pub possible_cause: String,
    pub recommendation: String,
    pub is_threshold_exceeded: bool,
    pub analysis_timestamp: DateTime<Utc>,
}

/// A persisted record and its analysis, if any
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTelemetry {
    pub id: i64,
    #[serde(flatten)]
    pub record: TelemetryRecord,
    pub analysis: Option<AnalysisResult>,
}
