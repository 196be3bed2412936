use std::sync::Arc;

use oracle_sdk::{ReasoningOracle, Role, ServiceError};

use super::support::{text, tool_call, FakeStore, ScriptedOracle};
use crate::classifier::Classification;
use crate::registry::ToolRegistry;
use crate::response::ResponseFormat;
use crate::router::QueryRouter;
use crate::tools::ToolName;

fn router(store: &Arc<FakeStore>, oracle: Option<Arc<ScriptedOracle>>) -> QueryRouter {
    let registry = Arc::new(ToolRegistry::standard(store.clone()));
    QueryRouter::new(
        registry,
        store.clone(),
        oracle.map(|o| o as Arc<dyn ReasoningOracle>),
        ResponseFormat::Text,
        5,
    )
}

#[tokio::test]
async fn schema_without_table_asks_for_clarification() {
    let store = Arc::new(FakeStore::new());
    let router = router(&store, None);

    let content = router
        .respond(
            "what columns are there?",
            &Classification::ToolSpecific {
                tool: ToolName::GetSchema,
                extracted_arg: None,
            },
        )
        .await;

    assert_eq!(
        content,
        "Please specify which table you want the schema for. Available tables: devices, telemetry_readings"
    );
}

#[tokio::test]
async fn tool_failure_is_rendered_as_text() {
    let store = Arc::new(FakeStore::new());
    let router = router(&store, None);

    let content = router
        .respond(
            "DROP TABLE x",
            &Classification::ToolSpecific {
                tool: ToolName::SqlAnalysis,
                extracted_arg: Some("DROP TABLE x".into()),
            },
        )
        .await;

    assert_eq!(content, "Error executing sqlAnalysis: Only SELECT queries are allowed");
    assert_eq!(store.query_count(), 0);
}

#[tokio::test]
async fn unknown_simple_action_is_not_available() {
    let store = Arc::new(FakeStore::new());
    let router = router(&store, None);

    let content = router
        .respond("", &Classification::Simple { action: "teleport".into() })
        .await;

    assert_eq!(content, "Tool 'teleport' is not available.");
}

#[tokio::test]
async fn complex_without_oracle_returns_guidance() {
    let store = Arc::new(FakeStore::new());
    let router = router(&store, None);

    let content = router
        .respond("Which sensor misbehaves most?", &Classification::Complex)
        .await;

    assert!(content.starts_with("I couldn't answer that directly."));
    for name in ToolName::ALL {
        assert!(content.contains(&format!("- {}:", name)), "{}", name);
    }
    assert_eq!(content, router.guidance());
}

#[tokio::test]
async fn sql_analysis_without_sql_takes_the_complex_path() {
    let store = Arc::new(FakeStore::new());
    let router = router(&store, None);

    let content = router
        .respond(
            "find anomalies",
            &Classification::ToolSpecific {
                tool: ToolName::SqlAnalysis,
                extracted_arg: None,
            },
        )
        .await;

    assert_eq!(content, router.guidance());
    assert_eq!(store.query_count(), 0);
}

#[tokio::test]
async fn schema_path_runs_oracle_sql() {
    let store = Arc::new(FakeStore::new());
    let oracle = Arc::new(ScriptedOracle::new(vec![text(
        "Here you go:\n```sql\nSELECT AVG(temperature) FROM telemetry_readings;\n```",
    )]));
    let router = router(&store, Some(oracle.clone()));

    let content = router
        .respond(
            "What is the average temperature in the telemetry table?",
            &Classification::Complex,
        )
        .await;

    assert_eq!(oracle.call_count(), 1);
    let prompt = oracle.request(0).messages[0].content.clone().unwrap();
    assert!(prompt.contains("Table telemetry_readings:"));
    assert!(prompt.contains("current: double precision"));

    assert_eq!(
        store.last_query().as_deref(),
        Some("SELECT AVG(temperature) FROM telemetry_readings")
    );
    assert!(content.contains("total_records"));
}

#[tokio::test]
async fn schema_path_without_sql_returns_schema() {
    let store = Arc::new(FakeStore::new());
    let oracle = Arc::new(ScriptedOracle::new(vec![text("I am not sure which table to use.")]));
    let router = router(&store, Some(oracle.clone()));

    let content = router
        .respond("Explain the table layout", &Classification::Complex)
        .await;

    assert!(content.starts_with("Table devices:\ndevice_id: text (not null)"));
    assert!(content.contains("Table telemetry_readings:"));
    assert_eq!(store.query_count(), 0);
}

#[tokio::test]
async fn schema_path_respects_table_limit() {
    let store = Arc::new(FakeStore::new());
    let registry = Arc::new(ToolRegistry::standard(store.clone()));
    let router = QueryRouter::new(registry, store.clone(), None, ResponseFormat::Text, 1);

    let content = router.respond("show table info", &Classification::Complex).await;

    assert!(content.contains("Table devices:"));
    assert!(!content.contains("Table telemetry_readings:"));
}

#[tokio::test]
async fn agent_turn_executes_tool_calls_then_follows_up() {
    let store = Arc::new(FakeStore::new());
    let oracle = Arc::new(ScriptedOracle::new(vec![
        tool_call("call_1", "listTables", ""),
        text("```\nThere are two tables: devices and telemetry_readings.\n```"),
    ]));
    let router = router(&store, Some(oracle.clone()));

    let content = router
        .respond("Which sensor misbehaves most?", &Classification::Complex)
        .await;

    assert_eq!(content, "There are two tables: devices and telemetry_readings.");
    assert_eq!(oracle.call_count(), 2);

    let first = oracle.request(0);
    assert_eq!(first.tools.len(), ToolName::ALL.len());
    assert!(first.system.is_some());

    let second = oracle.request(1);
    assert!(second.tools.is_empty());
    let tool_message = second.messages.last().unwrap();
    assert_eq!(tool_message.role, Role::Tool);
    assert_eq!(tool_message.tool_call_id.as_deref(), Some("call_1"));
    assert_eq!(
        tool_message.content.as_deref(),
        Some("Tables in the database: devices, telemetry_readings")
    );
}

#[tokio::test]
async fn agent_turn_is_bounded_to_two_calls() {
    let store = Arc::new(FakeStore::new());
    let oracle = Arc::new(ScriptedOracle::new(vec![
        tool_call("call_1", "count_records", ""),
        tool_call("call_2", "latest_data", ""),
        text("never requested"),
    ]));
    let router = router(&store, Some(oracle.clone()));

    let content = router
        .respond("Which sensor misbehaves most?", &Classification::Complex)
        .await;

    assert_eq!(oracle.call_count(), 2);
    assert_eq!(content, router.guidance());
}

#[tokio::test]
async fn agent_turn_failure_falls_back_to_guidance() {
    let store = Arc::new(FakeStore::new());
    let oracle = Arc::new(ScriptedOracle::new(vec![Err(ServiceError::rate_limit("slow down"))]));
    let router = router(&store, Some(oracle.clone()));

    let content = router
        .respond("Which sensor misbehaves most?", &Classification::Complex)
        .await;

    assert_eq!(content, router.guidance());
    assert_eq!(oracle.call_count(), 1);
}

#[tokio::test]
async fn agent_tool_errors_are_fed_back_as_text() {
    let store = Arc::new(FakeStore::new());
    let oracle = Arc::new(ScriptedOracle::new(vec![
        tool_call("call_1", "sqlAnalysis", "DELETE FROM devices"),
        text("I cannot modify data."),
    ]));
    let router = router(&store, Some(oracle.clone()));

    let content = router
        .respond("Please clean up old sensors", &Classification::Complex)
        .await;

    assert_eq!(content, "I cannot modify data.");
    assert_eq!(store.query_count(), 0);
    let tool_message = oracle.request(1).messages.last().cloned().unwrap();
    assert_eq!(
        tool_message.content.as_deref(),
        Some("Error executing sqlAnalysis: Only SELECT queries are allowed")
    );
}
