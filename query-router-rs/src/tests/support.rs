use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use oracle_sdk::{OracleReply, OracleRequest, ReasoningOracle, ServiceError, ToolCall};
use serde_json::{json, Value};
use structured_store::{ColumnInfo, StoreError, StructuredStore};

/// Store with two tables that records every query it runs
pub struct FakeStore {
    tables: Vec<(String, Vec<ColumnInfo>)>,
    rows: Vec<Value>,
    pub queries: Mutex<Vec<String>>,
}

fn column(name: &str, data_type: &str, nullable: bool) -> ColumnInfo {
    ColumnInfo {
        name: name.to_string(),
        data_type: data_type.to_string(),
        nullable,
    }
}

impl FakeStore {
    pub fn new() -> Self {
        Self {
            tables: vec![
                (
                    "devices".to_string(),
                    vec![column("device_id", "text", false), column("location", "text", true)],
                ),
                (
                    "telemetry_readings".to_string(),
                    vec![
                        column("id", "bigint", false),
                        column("device_id", "text", false),
                        column("current", "double precision", true),
                        column("temperature", "double precision", true),
                    ],
                ),
            ],
            rows: vec![json!({"total_records": 3})],
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub fn last_query(&self) -> Option<String> {
        self.queries.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl StructuredStore for FakeStore {
    async fn list_tables(&self) -> structured_store::Result<Vec<String>> {
        Ok(self.tables.iter().map(|(name, _)| name.clone()).collect())
    }

    async fn describe_table(&self, table: &str) -> structured_store::Result<Vec<ColumnInfo>> {
        self.tables
            .iter()
            .find(|(name, _)| name == table)
            .map(|(_, columns)| columns.clone())
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))
    }

    async fn query(&self, sql: &str) -> structured_store::Result<Vec<Value>> {
        self.queries.lock().unwrap().push(sql.to_string());
        Ok(self.rows.clone())
    }
}

/// Oracle replaying a fixed script and recording requests
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<oracle_sdk::Result<OracleReply>>>,
    pub requests: Mutex<Vec<OracleRequest>>,
}

impl ScriptedOracle {
    pub fn new(replies: Vec<oracle_sdk::Result<OracleReply>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn request(&self, index: usize) -> OracleRequest {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl ReasoningOracle for ScriptedOracle {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: OracleRequest) -> oracle_sdk::Result<OracleReply> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::internal("script exhausted")))
    }
}

pub fn text(content: &str) -> oracle_sdk::Result<OracleReply> {
    Ok(OracleReply::text(content))
}

pub fn tool_call(id: &str, name: &str, input: &str) -> oracle_sdk::Result<OracleReply> {
    Ok(OracleReply {
        content: None,
        tool_calls: vec![ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments: json!({ "input": input }).to_string(),
        }],
    })
}
