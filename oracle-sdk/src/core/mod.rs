//! Core abstractions for the Oracle SDK
//!
//! - `ReasoningOracle`: the boundary every oracle backend implements
//! - `OracleRequest` / `OracleReply`: provider-neutral request and reply
//! - `ToolSpec` / `ToolCall`: agentic mode, where the oracle may ask the
//!   caller to run named tools taking a single string argument

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServiceError};

/// Role of a message in an oracle conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// One turn of an oracle conversation
#[derive(Debug, Clone, PartialEq)]
pub struct OracleMessage {
    pub role: Role,
    pub content: Option<String>,
    /// Tool calls requested by the assistant in this turn
    pub tool_calls: Vec<ToolCall>,
    /// For `Role::Tool` messages, the call this message answers
    pub tool_call_id: Option<String>,
}

impl OracleMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }
}

/// A tool the oracle may call in agentic mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
}

/// A tool invocation requested by the oracle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON arguments as produced by the oracle
    pub arguments: String,
}

impl ToolCall {
    /// The single string argument of the call.
    ///
    /// Accepts `{"input": "..."}`, a bare JSON string, or any other JSON
    /// object (first string field); falls back to the raw text.
    pub fn input(&self) -> String {
        match serde_json::from_str::<serde_json::Value>(&self.arguments) {
            Ok(serde_json::Value::String(s)) => s,
            Ok(serde_json::Value::Object(map)) => map
                .get("input")
                .and_then(|v| v.as_str())
                .or_else(|| map.values().find_map(|v| v.as_str()))
                .unwrap_or_default()
                .to_string(),
            _ => self.arguments.trim().to_string(),
        }
    }
}

/// Provider-neutral oracle request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OracleRequest {
    pub system: Option<String>,
    pub messages: Vec<OracleMessage>,
    pub tools: Vec<ToolSpec>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl OracleRequest {
    /// A single-prompt request
    pub fn prompt(text: impl Into<String>) -> Self {
        Self {
            messages: vec![OracleMessage::user(text)],
            ..Self::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Provider-neutral oracle reply
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OracleReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl OracleReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn wants_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Boundary trait for reasoning oracle backends
#[async_trait]
pub trait ReasoningOracle: Send + Sync {
    /// Backend identifier used in logs
    fn name(&self) -> &str;

    /// Send one request and return the oracle's reply
    async fn complete(&self, request: OracleRequest) -> Result<OracleReply>;
}

/// Convenience helpers available on every oracle
#[async_trait]
pub trait ReasoningOracleExt: ReasoningOracle {
    /// Send a single prompt and return the text of the reply
    async fn ask(&self, prompt: &str) -> Result<String> {
        let reply = self.complete(OracleRequest::prompt(prompt)).await?;
        reply
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ServiceError::parsing("Oracle reply carried no text content"))
    }
}

impl<T: ReasoningOracle + ?Sized> ReasoningOracleExt for T {}
