//! # Oracle SDK
//!
//! Client-side plumbing for the reasoning oracle used by the Telemetry
//! Insight services.
//!
//! This crate provides:
//!
//! - The `ReasoningOracle` trait every oracle backend implements
//! - An OpenAI-compatible chat completion client with tool calling
//! - A categorized error system (`ServiceError`) with HTTP status context
//! - Retry with exponential backoff for transport failures
//! - Configuration providers (environment, in-memory, composite)
//! - Text helpers for fenced / embedded JSON in oracle replies
//!
//! ## Architecture
//!
//! Callers depend on `ReasoningOracle` only. Rate limiting is surfaced as
//! `ServiceError::RateLimit` (HTTP 429) and is deliberately *not* retried
//! here; the telemetry pipeline owns the circuit breaker for it.

pub mod core;
pub use crate::core::{
    OracleMessage, OracleReply, OracleRequest, ReasoningOracle, ReasoningOracleExt, Role, ToolCall,
    ToolSpec,
};

pub mod services;
pub use services::openai;

pub mod error;
pub use error::{ErrorContext, Result, ServiceError};

pub mod resilience;
pub use resilience::{RetryConfig, RetryExecutor};

pub mod config;
pub use config::{ConfigProvider, ConfigProviderExt, OracleConfig};

pub mod util;

#[cfg(test)]
mod tests;
