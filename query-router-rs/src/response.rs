//! Response shape shared by every routing path

use oracle_sdk::util::strip_code_fences;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::classifier::Classification;

/// Inbound question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub session_id: String,
}

impl Question {
    pub fn new(text: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            session_id: session_id.into(),
        }
    }
}

/// Shape of response content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Text,
    Json,
}

/// Canonical structured answer
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredContent {
    pub summary: String,
    pub data: Value,
    pub visualizations: Vec<Value>,
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
}

impl StructuredContent {
    /// Raw text as the summary, everything else empty
    pub fn wrap(text: impl Into<String>) -> Self {
        Self {
            summary: text.into(),
            ..Self::default()
        }
    }

    fn from_object(map: Map<String, Value>) -> Self {
        let summary = match map.get("summary") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };

        let visualizations = match map.get("visualizations") {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => vec![other.clone()],
        };

        Self {
            summary,
            data: map.get("data").cloned().unwrap_or(Value::Null),
            visualizations,
            insights: string_list(map.get("insights")),
            recommendations: string_list(map.get("recommendations")),
        }
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// Either plain text or the canonical structured object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseContent {
    Text(String),
    Structured(StructuredContent),
}

impl ResponseContent {
    /// Shape raw content for `format`.
    ///
    /// In JSON format an object becomes structured content with missing
    /// fields defaulted, an array becomes `data`, anything else is wrapped
    /// with the raw text as summary.
    pub fn normalize(raw: String, format: ResponseFormat) -> Self {
        match format {
            ResponseFormat::Text => ResponseContent::Text(raw),
            ResponseFormat::Json => {
                let unfenced = strip_code_fences(&raw);
                match serde_json::from_str::<Value>(&unfenced) {
                    Ok(Value::Object(map)) => ResponseContent::Structured(StructuredContent::from_object(map)),
                    Ok(Value::Array(rows)) => ResponseContent::Structured(StructuredContent {
                        summary: format!("{} row(s) returned", rows.len()),
                        data: Value::Array(rows),
                        ..StructuredContent::default()
                    }),
                    _ => ResponseContent::Structured(StructuredContent::wrap(raw)),
                }
            }
        }
    }

    /// The text a human reads first
    pub fn summary(&self) -> &str {
        match self {
            ResponseContent::Text(text) => text,
            ResponseContent::Structured(content) => &content.summary,
        }
    }
}

/// Answer to one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub session_id: String,
    pub classification: Classification,
    pub content: ResponseContent,
}
