//! Read-only tools over the structured store

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use structured_store::{format_columns, StoreError, StructuredStore, TELEMETRY_TABLE};

use crate::registry::Tool;

/// Every tool the registry knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ToolName {
    #[serde(rename = "listTables")]
    ListTables,
    #[serde(rename = "getSchema")]
    GetSchema,
    #[serde(rename = "sqlAnalysis")]
    SqlAnalysis,
    #[serde(rename = "count_records")]
    CountRecords,
    #[serde(rename = "latest_data")]
    LatestData,
    #[serde(rename = "active_devices")]
    ActiveDevices,
    #[serde(rename = "high_temperature")]
    HighTemperature,
    #[serde(rename = "exceeded_current")]
    ExceededCurrent,
}

impl ToolName {
    pub const ALL: [ToolName; 8] = [
        ToolName::ListTables,
        ToolName::GetSchema,
        ToolName::SqlAnalysis,
        ToolName::CountRecords,
        ToolName::LatestData,
        ToolName::ActiveDevices,
        ToolName::HighTemperature,
        ToolName::ExceededCurrent,
    ];

    /// Quick aggregate actions reachable through `Classification::Simple`
    pub const QUICK_ACTIONS: [ToolName; 5] = [
        ToolName::CountRecords,
        ToolName::LatestData,
        ToolName::ActiveDevices,
        ToolName::HighTemperature,
        ToolName::ExceededCurrent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::ListTables => "listTables",
            ToolName::GetSchema => "getSchema",
            ToolName::SqlAnalysis => "sqlAnalysis",
            ToolName::CountRecords => "count_records",
            ToolName::LatestData => "latest_data",
            ToolName::ActiveDevices => "active_devices",
            ToolName::HighTemperature => "high_temperature",
            ToolName::ExceededCurrent => "exceeded_current",
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        ToolName::ALL
            .iter()
            .copied()
            .find(|tool| tool.as_str() == name)
            .ok_or_else(|| name.to_string())
    }
}

/// Lists user tables
pub struct ListTablesTool {
    store: Arc<dyn StructuredStore>,
}

impl ListTablesTool {
    pub fn new(store: Arc<dyn StructuredStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ListTablesTool {
    fn name(&self) -> ToolName {
        ToolName::ListTables
    }

    fn description(&self) -> &str {
        "List all tables in the database"
    }

    async fn execute(&self, _arg: &str) -> Result<String, StoreError> {
        let tables = self.store.list_tables().await?;
        Ok(format!("Tables in the database: {}", tables.join(", ")))
    }
}

/// Describes one table
pub struct GetSchemaTool {
    store: Arc<dyn StructuredStore>,
}

impl GetSchemaTool {
    pub fn new(store: Arc<dyn StructuredStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for GetSchemaTool {
    fn name(&self) -> ToolName {
        ToolName::GetSchema
    }

    fn description(&self) -> &str {
        "Get the columns of a table. Input: the table name"
    }

    async fn execute(&self, arg: &str) -> Result<String, StoreError> {
        let table = arg.trim();
        let columns = self.store.describe_table(table).await?;
        Ok(format!("Schema for table {}:\n{}", table, format_columns(&columns)))
    }
}

/// Runs a caller-supplied SELECT
pub struct SqlAnalysisTool {
    store: Arc<dyn StructuredStore>,
}

impl SqlAnalysisTool {
    pub fn new(store: Arc<dyn StructuredStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for SqlAnalysisTool {
    fn name(&self) -> ToolName {
        ToolName::SqlAnalysis
    }

    fn description(&self) -> &str {
        "Run a read-only SQL SELECT query and return the rows as JSON. Input: the SQL statement"
    }

    async fn execute(&self, arg: &str) -> Result<String, StoreError> {
        let statement = structured_store::ensure_select(arg)?;
        let rows = self.store.query(statement).await?;
        Ok(serde_json::to_string_pretty(&rows)?)
    }
}

/// A named fixed query over the telemetry table
pub struct QuickActionTool {
    name: ToolName,
    description: &'static str,
    sql: String,
    store: Arc<dyn StructuredStore>,
}

impl QuickActionTool {
    /// Build the quick action for `name`; `None` for tools that take input
    pub fn new(name: ToolName, store: Arc<dyn StructuredStore>) -> Option<Self> {
        let (description, sql) = match name {
            ToolName::CountRecords => (
                "Count all telemetry records",
                format!("SELECT COUNT(*) AS total_records FROM {}", TELEMETRY_TABLE),
            ),
            ToolName::LatestData => (
                "Show the ten most recent telemetry readings",
                format!("SELECT * FROM {} ORDER BY timestamp DESC LIMIT 10", TELEMETRY_TABLE),
            ),
            ToolName::ActiveDevices => (
                "List devices with their reading count and last report time",
                format!(
                    "SELECT device_id, COUNT(*) AS readings, MAX(timestamp) AS last_seen \
                     FROM {} GROUP BY device_id ORDER BY last_seen DESC",
                    TELEMETRY_TABLE
                ),
            ),
            ToolName::HighTemperature => (
                "Show readings with temperature above 80°C",
                format!(
                    "SELECT device_id, timestamp, temperature FROM {} \
                     WHERE temperature > 80 ORDER BY temperature DESC LIMIT 20",
                    TELEMETRY_TABLE
                ),
            ),
            ToolName::ExceededCurrent => (
                "Show readings whose current exceeded the threshold, with their analysis",
                format!(
                    "SELECT device_id, timestamp, current, severity, possible_cause FROM {} \
                     WHERE is_threshold_exceeded ORDER BY timestamp DESC LIMIT 20",
                    TELEMETRY_TABLE
                ),
            ),
            ToolName::ListTables | ToolName::GetSchema | ToolName::SqlAnalysis => return None,
        };

        Some(Self {
            name,
            description,
            sql,
            store,
        })
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

#[async_trait]
impl Tool for QuickActionTool {
    fn name(&self) -> ToolName {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    async fn execute(&self, _arg: &str) -> Result<String, StoreError> {
        let rows = self.store.query(&self.sql).await?;
        Ok(serde_json::to_string_pretty(&rows)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_names_round_trip() {
        for name in ToolName::ALL {
            assert_eq!(name.as_str().parse::<ToolName>(), Ok(name));
        }
        assert_eq!("dropEverything".parse::<ToolName>(), Err("dropEverything".to_string()));
    }

    #[test]
    fn serde_uses_wire_names() {
        assert_eq!(serde_json::to_string(&ToolName::ListTables).unwrap(), "\"listTables\"");
        assert_eq!(serde_json::to_string(&ToolName::CountRecords).unwrap(), "\"count_records\"");
    }
}
