use std::time::Duration;

use log::warn;
use oracle_sdk::config::{ConfigProvider, ConfigProviderExt, DEFAULT_PROVIDER};
use serde::{Deserialize, Serialize};

/// What to produce while the oracle circuit is open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockedPolicy {
    /// Deterministic severity from the exceedance ratio
    #[default]
    Fallback,
    /// Severity UNKNOWN with a fixed cause and recommendation
    Unknown,
}

/// Where telemetry records are persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryBackend {
    Memory,
    Postgres { database_url: String },
}

/// Telemetry pipeline settings
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Current above which a reading is analyzed
    pub current_threshold: f64,
    /// How long the oracle is left alone after a rate limit
    pub cooldown: Duration,
    /// Upper bound on a single analysis call
    pub oracle_timeout: Duration,
    pub blocked_policy: BlockedPolicy,
    pub repository: RepositoryBackend,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            current_threshold: 50.0,
            cooldown: Duration::from_secs(60),
            oracle_timeout: Duration::from_secs(30),
            blocked_policy: BlockedPolicy::Fallback,
            repository: RepositoryBackend::Memory,
        }
    }
}

impl PipelineConfig {
    /// Read `pipeline_*` keys plus `database_url`; bad values fall back
    /// to defaults. Without `pipeline_repository`, records go to Postgres
    /// whenever `database_url` is set; `memory` must be asked for.
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Self {
        let defaults = Self::default();

        let current_threshold = match provider.get_float("pipeline_current_threshold") {
            Ok(value) if value.is_finite() && value > 0.0 => value,
            Ok(value) => {
                warn!("Ignoring non-positive current threshold {}", value);
                defaults.current_threshold
            }
            Err(_) => defaults.current_threshold,
        };

        let blocked_policy = match provider.get_string("pipeline_blocked_policy") {
            Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
                "fallback" => BlockedPolicy::Fallback,
                "unknown" => BlockedPolicy::Unknown,
                other => {
                    warn!("Unknown blocked policy '{}', using fallback", other);
                    defaults.blocked_policy
                }
            },
            Err(_) => defaults.blocked_policy,
        };

        let requested = provider
            .get_string("pipeline_repository")
            .ok()
            .map(|value| value.trim().to_ascii_lowercase());
        let database_url = provider
            .get_string("database_url")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let repository = match (requested.as_deref(), database_url) {
            (None, Some(database_url)) | (Some("postgres" | "postgresql"), Some(database_url)) => {
                RepositoryBackend::Postgres { database_url }
            }
            (None, None) | (Some("memory" | "in-memory"), _) => RepositoryBackend::Memory,
            (Some("postgres" | "postgresql"), None) => {
                warn!("Postgres repository requested without database_url, using memory");
                RepositoryBackend::Memory
            }
            (Some(other), _) => {
                warn!("Unknown repository backend '{}', using memory", other);
                RepositoryBackend::Memory
            }
        };

        Self {
            current_threshold,
            cooldown: seconds(provider, "pipeline_cooldown_seconds", defaults.cooldown),
            oracle_timeout: seconds(provider, "pipeline_oracle_timeout_seconds", defaults.oracle_timeout),
            blocked_policy,
            repository,
        }
    }

    /// Load from `INSIGHT_PIPELINE_*` environment variables
    pub fn from_env() -> Self {
        Self::from_provider(&**DEFAULT_PROVIDER)
    }
}

fn seconds<P: ConfigProvider + ?Sized>(provider: &P, key: &str, default: Duration) -> Duration {
    match provider.get_int(key) {
        Ok(value) if value > 0 => Duration::from_secs(value as u64),
        _ => default,
    }
}
