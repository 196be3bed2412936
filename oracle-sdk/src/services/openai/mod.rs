//! OpenAI-compatible reasoning oracle client
//!
//! Talks to any `/chat/completions` endpoint that follows the OpenAI wire
//! format, including tool calling for agentic turns.

mod models;
pub use models::*;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;

use crate::config::OracleConfig;
use crate::core::{OracleMessage, OracleReply, OracleRequest, ReasoningOracle, Role, ToolCall, ToolSpec};
use crate::error::mapping::classify_http_error;
use crate::error::{Result, ServiceError};
use crate::resilience::{RetryConfig, RetryExecutor};
use crate::services::common::{build_http_client, parse_error_response, UserAgent};
use crate::util::generate_request_id;

const CHAT_ENDPOINT: &str = "chat/completions";

/// OpenAI-compatible chat completion client
pub struct OpenAIClient {
    /// HTTP client
    http_client: Client,

    /// Configuration
    config: OracleConfig,

    /// Transport retry policy
    retry: RetryExecutor,
}

impl OpenAIClient {
    /// Create a client with an explicit configuration
    pub fn new_with_config(config: OracleConfig) -> Result<Self> {
        Self::with_retry(config, RetryConfig::default())
    }

    fn with_retry(config: OracleConfig, retry: RetryConfig) -> Result<Self> {
        config.validate()?;

        let http_client = build_http_client(
            Some(UserAgent {
                extra: Some("openai-oracle".to_string()),
                ..UserAgent::default()
            }),
            Some(Duration::from_secs(config.timeout_seconds)),
        )?;

        Ok(Self {
            http_client,
            config,
            retry: RetryExecutor::new(retry),
        })
    }

    /// Create a new builder for the client
    pub fn builder() -> OpenAIClientBuilder {
        OpenAIClientBuilder::default()
    }

    /// Active configuration
    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    /// Send a chat completion request, retrying transport failures
    pub async fn chat_completion(&self, request: ChatCompletionRequest) -> Result<ChatCompletionResponse> {
        self.retry.execute(|| self.send_chat(&request)).await
    }

    async fn send_chat(&self, request: &ChatCompletionRequest) -> Result<ChatCompletionResponse> {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), CHAT_ENDPOINT);
        let request_id = generate_request_id();
        debug!("Sending request {} to oracle: POST {}", request_id, url);

        let started = Instant::now();
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .header("X-Request-Id", &request_id)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                "Oracle request failed with status {} ({}) after {:?}",
                status,
                classify_http_error(status),
                started.elapsed()
            );
            return Err(parse_error_response("openai", CHAT_ENDPOINT, response).await);
        }

        let parsed = response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| ServiceError::parsing(format!("Failed to parse chat completion: {}", e)))?;

        if let Some(usage) = &parsed.usage {
            debug!(
                "Oracle call completed in {:?} ({} prompt / {} completion tokens)",
                started.elapsed(),
                usage.prompt_tokens,
                usage.completion_tokens
            );
        }

        Ok(parsed)
    }

    fn to_chat_request(&self, request: OracleRequest) -> ChatCompletionRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);

        if let Some(system) = request.system {
            messages.push(ChatMessage {
                role: Role::System.as_str().to_string(),
                content: Some(system),
                tool_calls: None,
                tool_call_id: None,
            });
        }

        messages.extend(request.messages.into_iter().map(to_chat_message));

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(request.tools.iter().map(to_chat_tool).collect())
        };

        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages,
            temperature: Some(request.temperature.unwrap_or(self.config.temperature)),
            max_tokens: request.max_tokens,
            tools,
        }
    }
}

fn to_chat_message(message: OracleMessage) -> ChatMessage {
    let tool_calls = if message.tool_calls.is_empty() {
        None
    } else {
        Some(
            message
                .tool_calls
                .into_iter()
                .map(|call| ChatToolCall {
                    id: call.id,
                    call_type: "function".to_string(),
                    function: FunctionCall {
                        name: call.name,
                        arguments: call.arguments,
                    },
                })
                .collect(),
        )
    };

    ChatMessage {
        role: message.role.as_str().to_string(),
        content: message.content,
        tool_calls,
        tool_call_id: message.tool_call_id,
    }
}

/// Every tool takes a single string argument named `input`
fn to_chat_tool(spec: &ToolSpec) -> ChatTool {
    ChatTool {
        tool_type: "function".to_string(),
        function: FunctionDefinition {
            name: spec.name.clone(),
            description: spec.description.clone(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "input": { "type": "string" }
                },
                "required": ["input"]
            }),
        },
    }
}

fn from_chat_response(response: ChatCompletionResponse) -> Result<OracleReply> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ServiceError::parsing("No completion choices returned"))?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| ToolCall {
            id: call.id,
            name: call.function.name,
            arguments: call.function.arguments,
        })
        .collect();

    Ok(OracleReply {
        content: choice.message.content,
        tool_calls,
    })
}

#[async_trait]
impl ReasoningOracle for OpenAIClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: OracleRequest) -> Result<OracleReply> {
        let chat_request = self.to_chat_request(request);
        let response = self.chat_completion(chat_request).await?;
        from_chat_response(response)
    }
}

/// Builder for the OpenAI-compatible client
#[derive(Default)]
pub struct OpenAIClientBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_seconds: Option<u64>,
    temperature: Option<f32>,
    retry_config: Option<RetryConfig>,
}

impl OpenAIClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Transport timeout in seconds
    pub fn timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = Some(timeout_seconds);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = Some(retry_config);
        self
    }

    pub fn build(self) -> Result<OpenAIClient> {
        let defaults = OracleConfig::default();

        let config = OracleConfig {
            api_key: self
                .api_key
                .ok_or_else(|| ServiceError::configuration("Oracle API key is required"))?,
            base_url: self.base_url.unwrap_or(defaults.base_url),
            model: self.model.unwrap_or(defaults.model),
            timeout_seconds: self.timeout_seconds.unwrap_or(defaults.timeout_seconds),
            temperature: self.temperature.unwrap_or(defaults.temperature),
        };

        OpenAIClient::with_retry(config, self.retry_config.unwrap_or_default())
    }
}
