//! Query Router / Responder
//!
//! Turns a classification into response text. Tool failures become
//! readable strings here and never escape to the caller. The complex
//! strategy issues at most two sequential oracle calls.

use std::sync::Arc;

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use oracle_sdk::util::strip_code_fences;
use oracle_sdk::{OracleMessage, OracleRequest, ReasoningOracle, ReasoningOracleExt};
use regex::Regex;
use structured_store::{format_columns, StructuredStore};

use crate::classifier::Classification;
use crate::registry::ToolRegistry;
use crate::response::ResponseFormat;
use crate::sql_extract::extract_sql;
use crate::tools::ToolName;

static SCHEMA_HINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:schema|structure|columns?|tables?)\b").expect("valid schema hint regex")
});

const AGENT_SYSTEM_PROMPT: &str = "You are a data assistant for a device telemetry database. \
Use the available tools to look up tables, schemas and data before answering. \
Only read data; never attempt to modify it. Answer concisely.";

const JSON_ANSWER_INSTRUCTION: &str = " Reply with a JSON object with the fields \
summary (string), data, visualizations (array), insights (array of strings) and \
recommendations (array of strings).";

/// Routes classified questions to tools or the oracle
pub struct QueryRouter {
    registry: Arc<ToolRegistry>,
    store: Arc<dyn StructuredStore>,
    oracle: Option<Arc<dyn ReasoningOracle>>,
    format: ResponseFormat,
    max_schema_tables: usize,
}

impl QueryRouter {
    pub fn new(
        registry: Arc<ToolRegistry>,
        store: Arc<dyn StructuredStore>,
        oracle: Option<Arc<dyn ReasoningOracle>>,
        format: ResponseFormat,
        max_schema_tables: usize,
    ) -> Self {
        Self {
            registry,
            store,
            oracle,
            format,
            max_schema_tables: max_schema_tables.max(1),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Produce the raw content for a classified question
    pub async fn respond(&self, question: &str, classification: &Classification) -> String {
        match classification {
            Classification::ToolSpecific { tool, extracted_arg } => {
                self.respond_tool(question, *tool, extracted_arg.as_deref()).await
            }
            Classification::Simple { action } => self.invoke(action, "").await,
            Classification::Complex => self.respond_complex(question).await,
        }
    }

    async fn respond_tool(&self, question: &str, tool: ToolName, arg: Option<&str>) -> String {
        match (tool, arg.map(str::trim).filter(|a| !a.is_empty())) {
            (ToolName::GetSchema, None) => self.clarify_table().await,
            (ToolName::SqlAnalysis, None) => {
                debug!("No SQL in question, delegating to complex strategy");
                self.respond_complex(question).await
            }
            (tool, arg) => self.invoke(tool.as_str(), arg.unwrap_or("")).await,
        }
    }

    /// Invoke a tool, rendering any failure as text
    async fn invoke(&self, name: &str, arg: &str) -> String {
        match self.registry.invoke(name, arg).await {
            Ok(content) => content,
            Err(e) => {
                warn!("Tool invocation failed: {}", e);
                e.to_string()
            }
        }
    }

    async fn clarify_table(&self) -> String {
        let prompt = "Please specify which table you want the schema for";
        match self.store.list_tables().await {
            Ok(tables) if !tables.is_empty() => {
                format!("{}. Available tables: {}", prompt, tables.join(", "))
            }
            Ok(_) => format!("{}.", prompt),
            Err(e) => {
                warn!("Could not list tables for clarification: {}", e);
                format!("{}.", prompt)
            }
        }
    }

    async fn respond_complex(&self, question: &str) -> String {
        if SCHEMA_HINT.is_match(question) {
            if let Some(content) = self.schema_first(question).await {
                return content;
            }
        } else if let Some(content) = self.agent_turn(question).await {
            return content;
        }

        self.guidance()
    }

    /// Gather schema, ask the oracle for one SELECT and run it.
    /// Without usable SQL the schema itself is the answer.
    async fn schema_first(&self, question: &str) -> Option<String> {
        let schema = match self.gather_schema().await {
            Ok(schema) if !schema.is_empty() => schema,
            Ok(_) => return None,
            Err(e) => {
                warn!("Schema gathering failed: {}", e);
                return None;
            }
        };

        let Some(oracle) = &self.oracle else {
            return Some(schema);
        };

        let prompt = format!(
            "Database schema:\n{}\n\nWrite a single read-only PostgreSQL SELECT statement, \
             terminated by a semicolon, that answers this question:\n{}",
            schema, question
        );

        match oracle.ask(&prompt).await {
            Ok(answer) => match extract_sql(&answer) {
                Some(sql) => {
                    info!("Running oracle-generated SQL: {}", sql);
                    Some(self.invoke(ToolName::SqlAnalysis.as_str(), &sql).await)
                }
                None => {
                    debug!("No SQL found in oracle reply, returning schema");
                    Some(schema)
                }
            },
            Err(e) => {
                warn!("Oracle SQL generation failed: {}", e);
                Some(schema)
            }
        }
    }

    async fn gather_schema(&self) -> structured_store::Result<String> {
        let tables = self.store.list_tables().await?;
        let mut sections = Vec::with_capacity(tables.len().min(self.max_schema_tables));

        for table in tables.iter().take(self.max_schema_tables) {
            let columns = self.store.describe_table(table).await?;
            sections.push(format!("Table {}:\n{}", table, format_columns(&columns)));
        }

        Ok(sections.join("\n\n"))
    }

    /// One agentic oracle turn plus at most one follow-up after tool calls
    async fn agent_turn(&self, question: &str) -> Option<String> {
        let oracle = self.oracle.as_ref()?;

        let mut system = AGENT_SYSTEM_PROMPT.to_string();
        if self.format == ResponseFormat::Json {
            system.push_str(JSON_ANSWER_INSTRUCTION);
        }

        let request = OracleRequest::prompt(question)
            .with_system(system.clone())
            .with_tools(self.registry.tool_specs());

        let reply = match oracle.complete(request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Oracle agent turn failed: {}", e);
                return None;
            }
        };

        if !reply.wants_tools() {
            return usable(reply.content);
        }

        let mut messages = vec![
            OracleMessage::user(question),
            OracleMessage::assistant(reply.content.clone(), reply.tool_calls.clone()),
        ];
        for call in &reply.tool_calls {
            debug!("Oracle requested tool {}", call.name);
            let output = self.invoke(&call.name, &call.input()).await;
            messages.push(OracleMessage::tool_result(call.id.clone(), output));
        }

        let follow_up = OracleRequest {
            system: Some(system),
            messages,
            ..OracleRequest::default()
        };

        match oracle.complete(follow_up).await {
            Ok(final_reply) => usable(final_reply.content),
            Err(e) => {
                warn!("Oracle follow-up failed: {}", e);
                None
            }
        }
    }

    /// Fixed message listing what can be asked
    pub fn guidance(&self) -> String {
        let mut message = String::from(
            "I couldn't answer that directly. Here is what I can help with:\n",
        );
        for descriptor in self.registry.descriptors() {
            message.push_str(&format!("- {}: {}\n", descriptor.name, descriptor.description));
        }
        message.push_str(
            "Try asking e.g. \"What tables are in the database?\", \
             \"Show the schema of telemetry_readings\" or \"How many records are there?\"",
        );
        message
    }
}

fn usable(content: Option<String>) -> Option<String> {
    content
        .map(|c| strip_code_fences(&c))
        .filter(|c| !c.is_empty())
}
