//! HTTP plumbing shared by oracle clients

use std::fmt;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;

use crate::error::mapping::map_http_error;
use crate::error::{ErrorContext, Result, ServiceError};

/// Sent as `User-Agent`, e.g. `Telemetry-Insight/0.1.0 (oracle-sdk)`
#[derive(Debug, Clone)]
pub struct UserAgent {
    pub app_name: String,
    pub version: String,
    pub extra: Option<String>,
}

impl Default for UserAgent {
    fn default() -> Self {
        Self {
            app_name: "Telemetry-Insight".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            extra: Some("oracle-sdk".to_string()),
        }
    }
}

impl fmt::Display for UserAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.extra {
            Some(extra) => write!(f, "{}/{} ({})", self.app_name, self.version, extra),
            None => write!(f, "{}/{}", self.app_name, self.version),
        }
    }
}

pub fn build_http_client(user_agent: Option<UserAgent>, timeout: Option<Duration>) -> Result<Client> {
    let agent = user_agent.unwrap_or_default().to_string();
    let agent = HeaderValue::from_str(&agent)
        .map_err(|e| ServiceError::configuration(format!("Invalid user agent '{}': {}", agent, e)))?;

    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, agent);

    Client::builder()
        .default_headers(headers)
        .timeout(timeout.unwrap_or(Duration::from_secs(30)))
        .gzip(true)
        .build()
        .map_err(|e| ServiceError::configuration(format!("HTTP client setup failed: {}", e)))
}

/// Turn a non-success response into a `ServiceError` carrying status,
/// endpoint and the provider's request id when present
pub async fn parse_error_response(service_name: &str, endpoint: &str, response: reqwest::Response) -> ServiceError {
    let status = response.status();
    let request_id = response
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let mut context = ErrorContext::for_service(service_name)
        .status_code(status.as_u16())
        .endpoint(endpoint);
    if let Some(id) = request_id {
        context = context.request_id(id);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|e| format!("<unreadable body: {}>", e));

    map_http_error(status, &body, &mut context).with_context(context)
}
