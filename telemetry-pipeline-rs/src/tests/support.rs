use std::time::Duration;

use async_trait::async_trait;
use mockall::mock;
use oracle_sdk::{ErrorContext, OracleReply, OracleRequest, ReasoningOracle, ServiceError};

use crate::config::{BlockedPolicy, PipelineConfig, RepositoryBackend};

mock! {
    pub Oracle {}

    #[async_trait]
    impl ReasoningOracle for Oracle {
        fn name(&self) -> &str;
        async fn complete(&self, request: OracleRequest) -> oracle_sdk::Result<OracleReply>;
    }
}

/// Oracle that never answers within any reasonable timeout
pub struct StalledOracle;

#[async_trait]
impl ReasoningOracle for StalledOracle {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn complete(&self, _request: OracleRequest) -> oracle_sdk::Result<OracleReply> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(OracleReply::text("{}"))
    }
}

pub fn config() -> PipelineConfig {
    PipelineConfig {
        current_threshold: 50.0,
        cooldown: Duration::from_secs(60),
        oracle_timeout: Duration::from_secs(5),
        blocked_policy: BlockedPolicy::Fallback,
        repository: RepositoryBackend::Memory,
    }
}

pub fn rate_limited() -> ServiceError {
    ServiceError::rate_limit("Too many requests")
        .with_context(ErrorContext::for_service("openai").status_code(429))
}

pub fn analysis_reply(severity: &str) -> OracleReply {
    OracleReply::text(format!(
        "```json\n{{\"severity\": \"{}\", \"possibleCause\": \"Motor overload\", \
         \"recommendation\": \"Reduce load\"}}\n```",
        severity
    ))
}
