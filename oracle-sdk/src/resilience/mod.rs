//! Resilience patterns for oracle clients
//!
//! Only transport-level retry lives here. Rate-limit handling (HTTP 429)
//! is a circuit concern owned by the callers that know their cool-down
//! policy.

mod retry;

pub use retry::{RetryConfig, RetryExecutor};
