//! Oracle error taxonomy
//!
//! Every failure talking to the oracle becomes a `ServiceError`. HTTP
//! details ride along in `ErrorContext` layers so callers can ask for the
//! status code, or whether the provider rate limited us, without matching
//! on transport types.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

pub mod mapping;

pub type Result<T> = std::result::Result<T, ServiceError>;

/// Status providers use to signal rate limiting
pub const RATE_LIMIT_STATUS: u16 = 429;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Service error: {0}")]
    Service(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// The oracle answered but the reply could not be used
    #[error("Parsing error: {0}")]
    Parsing(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Provider-side 5xx
    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("{inner}")]
    WithContext {
        inner: Box<ServiceError>,
        context: ErrorContext,
    },
}

macro_rules! constructors {
    ($($name:ident => $variant:ident),* $(,)?) => {
        impl ServiceError {
            $(
                pub fn $name(message: impl Into<String>) -> Self {
                    ServiceError::$variant(message.into())
                }
            )*
        }
    };
}

constructors! {
    network => Network,
    authentication => Authentication,
    authorization => Authorization,
    rate_limit => RateLimit,
    service => Service,
    validation => Validation,
    parsing => Parsing,
    configuration => Configuration,
    timeout => Timeout,
    internal => Internal,
    not_found => NotFound,
    external_service => ExternalService,
    unknown => Unknown,
}

impl ServiceError {
    /// Wrap in a new context layer
    pub fn with_context(self, context: ErrorContext) -> Self {
        ServiceError::WithContext {
            inner: Box::new(self),
            context,
        }
    }

    /// Record one extra key on the outermost context layer, adding a layer
    /// if there is none
    pub fn annotate(self, key: &str, value: impl fmt::Display) -> Self {
        let (inner, mut context) = match self {
            ServiceError::WithContext { inner, context } => (inner, context),
            other => (Box::new(other), ErrorContext::default()),
        };
        context.insert(key, value);
        ServiceError::WithContext { inner, context }
    }

    /// The error without any context layers
    pub fn root(&self) -> &ServiceError {
        match self {
            ServiceError::WithContext { inner, .. } => inner.root(),
            other => other,
        }
    }

    /// Context layers, outermost first
    pub fn contexts(&self) -> impl Iterator<Item = &ErrorContext> {
        std::iter::successors(Some(self), |err| match err {
            ServiceError::WithContext { inner, .. } => Some(inner.as_ref()),
            _ => None,
        })
        .filter_map(|err| match err {
            ServiceError::WithContext { context, .. } => Some(context),
            _ => None,
        })
    }

    pub fn status_code(&self) -> Option<u16> {
        self.contexts().find_map(|c| c.status_code)
    }

    /// Provider error code, e.g. `rate_limit_exceeded`
    pub fn error_code(&self) -> Option<&str> {
        self.contexts().find_map(|c| c.error_code.as_deref())
    }

    pub fn service_name(&self) -> Option<&str> {
        self.contexts()
            .map(|c| c.service.as_str())
            .find(|service| !service.is_empty())
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self.root(), ServiceError::RateLimit(_))
            || self.status_code() == Some(RATE_LIMIT_STATUS)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.root(), ServiceError::Timeout(_))
    }

    /// Only transport failures are retried. A 429 is left to the caller's
    /// circuit breaker, since retrying extends the provider's penalty.
    pub fn is_retryable(&self) -> bool {
        matches!(self.root(), ServiceError::Network(_) | ServiceError::Timeout(_))
    }
}

/// HTTP-level details attached to an error
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub service: String,
    pub status_code: Option<u16>,
    pub error_code: Option<String>,
    pub request_id: Option<String>,
    pub endpoint: Option<String>,
    pub extra: BTreeMap<String, String>,
}

impl ErrorContext {
    pub fn for_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            ..Self::default()
        }
    }

    pub fn status_code(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    pub fn error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl fmt::Display) {
        self.extra.insert(key.into(), value.to_string());
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        let base = if err.is_timeout() {
            ServiceError::timeout(format!("Request timed out: {}", err))
        } else if err.is_connect() || err.is_request() {
            ServiceError::network(format!("Could not reach oracle: {}", err))
        } else if err.is_decode() {
            ServiceError::parsing(format!("Response decode error: {}", err))
        } else {
            ServiceError::internal(format!("HTTP client error: {}", err))
        };

        let mut context = ErrorContext::for_service("http_client");
        context.status_code = err.status().map(|s| s.as_u16());
        base.with_context(context)
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::parsing(format!("JSON error: {}", err))
    }
}
