//! # Structured Store
//!
//! Read-only access to the relational store backing the telemetry insight
//! services: table listing, column descriptions and guarded SELECT queries
//! returning rows as JSON objects.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod config;
pub mod error;
pub mod guard;
pub mod postgres;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use guard::ensure_select;
pub use postgres::PostgresStore;

/// Table holding raw device readings
pub const TELEMETRY_TABLE: &str = "telemetry_readings";

/// One column of a table description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

/// Read-only structured store client
#[async_trait]
pub trait StructuredStore: Send + Sync {
    /// Names of all user tables
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Columns of `table` in declaration order
    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnInfo>>;

    /// Run a single SELECT and return its rows as JSON objects.
    ///
    /// Implementations must reject anything `ensure_select` rejects before
    /// touching the backend.
    async fn query(&self, sql: &str) -> Result<Vec<serde_json::Value>>;
}

/// Render a column list as `name: type` lines
pub fn format_columns(columns: &[ColumnInfo]) -> String {
    columns
        .iter()
        .map(|c| {
            if c.nullable {
                format!("{}: {}", c.name, c.data_type)
            } else {
                format!("{}: {} (not null)", c.name, c.data_type)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_columns_in_order() {
        let columns = vec![
            ColumnInfo {
                name: "device_id".into(),
                data_type: "text".into(),
                nullable: false,
            },
            ColumnInfo {
                name: "current".into(),
                data_type: "double precision".into(),
                nullable: true,
            },
        ];

        assert_eq!(
            format_columns(&columns),
            "device_id: text (not null)\ncurrent: double precision"
        );
    }
}
