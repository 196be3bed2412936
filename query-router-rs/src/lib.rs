//! # Query Router
//!
//! Routes natural-language questions about the telemetry store to one of
//! several execution strategies:
//!
//! - a specific read-only tool (list tables, describe a table, run a SELECT)
//! - a quick aggregate action over the telemetry table
//! - a multi-step strategy backed by the reasoning oracle
//!
//! Classification is an ordered keyword rule table with an optional oracle
//! fallback. Every path ends in a `QueryResponse`; failures are rendered
//! as readable content.

pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod registry;
pub mod response;
pub mod router;
pub mod sql_extract;
pub mod tools;

#[cfg(test)]
mod tests;

pub use classifier::{Classification, ClassifierMode, QueryClassifier};
pub use config::RouterConfig;
pub use engine::QueryEngine;
pub use error::ToolError;
pub use registry::{Tool, ToolDescriptor, ToolRegistry};
pub use response::{Question, QueryResponse, ResponseContent, ResponseFormat, StructuredContent};
pub use router::QueryRouter;
pub use sql_extract::extract_sql;
pub use tools::ToolName;
