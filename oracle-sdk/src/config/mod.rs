//! Key/value configuration sources
//!
//! Services look settings up by lower-case key (`oracle_model`,
//! `pipeline_current_threshold`). Where a value comes from is up to the
//! provider: the process environment, a fixed map, or a chain of both.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServiceError};

pub trait ConfigProvider: Send + Sync {
    fn get_string(&self, key: &str) -> Result<String>;
}

fn parse_value<T>(key: &str, raw: &str, kind: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| {
        ServiceError::configuration(format!("{} is not a valid {} ('{}'): {}", key, kind, raw, e))
    })
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ServiceError::configuration(format!(
            "{} is not a valid boolean ('{}')",
            key, raw
        ))),
    }
}

/// Typed lookups on top of `get_string`. The `_or` forms swallow both a
/// missing key and an unparsable value.
pub trait ConfigProviderExt: ConfigProvider {
    fn get_int(&self, key: &str) -> Result<i64> {
        parse_value(key, &self.get_string(key)?, "integer")
    }

    fn get_float(&self, key: &str) -> Result<f64> {
        parse_value(key, &self.get_string(key)?, "number")
    }

    fn get_bool(&self, key: &str) -> Result<bool> {
        parse_flag(key, &self.get_string(key)?)
    }

    fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|_| default.to_owned())
    }

    fn get_int_or(&self, key: &str, default: i64) -> i64 {
        self.get_int(key).unwrap_or(default)
    }

    fn get_float_or(&self, key: &str, default: f64) -> f64 {
        self.get_float(key).unwrap_or(default)
    }

    fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }
}

impl<T: ConfigProvider + ?Sized> ConfigProviderExt for T {}

/// Reads `{PREFIX}_{NAMESPACE}_{KEY}` from the environment, key upper-cased
/// and non-alphanumerics mapped to `_`
#[derive(Debug, Clone, Default)]
pub struct EnvConfigProvider {
    prefix: Option<String>,
    namespace: Option<String>,
}

impl EnvConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    fn variable_name(&self, key: &str) -> String {
        let key = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect::<String>();

        [self.prefix.as_deref(), self.namespace.as_deref(), Some(key.as_str())]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join("_")
    }
}

impl ConfigProvider for EnvConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        let name = self.variable_name(key);
        env::var(&name).map_err(|e| ServiceError::configuration(format!("{}: {}", name, e)))
    }
}

/// Fixed values, mostly for tests
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigProvider {
    values: HashMap<String, String>,
}

impl MemoryConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        self.values.insert(key.into(), value.to_string());
    }
}

impl ConfigProvider for MemoryConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        match self.values.get(key) {
            Some(value) => Ok(value.clone()),
            None => Err(ServiceError::configuration(format!("{} is not set", key))),
        }
    }
}

/// First provider that has the key wins
#[derive(Clone, Default)]
pub struct CompositeConfigProvider {
    providers: Vec<Arc<dyn ConfigProvider>>,
}

impl CompositeConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_provider(&mut self, provider: impl ConfigProvider + 'static) {
        self.providers.push(Arc::new(provider));
    }
}

impl ConfigProvider for CompositeConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        self.providers
            .iter()
            .find_map(|provider| provider.get_string(key).ok())
            .ok_or_else(|| ServiceError::configuration(format!("{} is not set by any provider", key)))
    }
}

/// `INSIGHT_*` environment variables
pub static DEFAULT_PROVIDER: Lazy<Arc<EnvConfigProvider>> =
    Lazy::new(|| Arc::new(EnvConfigProvider::new().with_prefix("INSIGHT")));

/// Connection settings for an OpenAI-compatible chat endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    pub api_key: String,
    /// Override for proxies and compatible providers
    pub base_url: String,
    pub model: String,
    pub timeout_seconds: u64,
    /// Used when a request leaves temperature unset
    pub temperature: f32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_seconds: 30,
            temperature: 0.2,
        }
    }
}

impl OracleConfig {
    /// Keys: `oracle_api_key` (required), `oracle_base_url`, `oracle_model`,
    /// `oracle_timeout_seconds`, `oracle_temperature`
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self> {
        let base = Self::default();
        let config = Self {
            api_key: provider.get_string("oracle_api_key")?,
            base_url: provider.get_string_or("oracle_base_url", &base.base_url),
            model: provider.get_string_or("oracle_model", &base.model),
            timeout_seconds: provider
                .get_int_or("oracle_timeout_seconds", base.timeout_seconds as i64)
                .max(1) as u64,
            temperature: provider.get_float_or("oracle_temperature", f64::from(base.temperature)) as f32,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let missing = [
            ("API key", &self.api_key),
            ("base URL", &self.base_url),
            ("model", &self.model),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty());

        match missing {
            Some((field, _)) => Err(ServiceError::configuration(format!("Oracle {} is required", field))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_getters_parse_and_default() {
        let mut provider = MemoryConfigProvider::new();
        provider.set("retries", " 3 ");
        provider.set("ratio", "1.5");
        provider.set("enabled", "Yes");
        provider.set("broken", "many");

        assert_eq!(provider.get_int("retries").unwrap(), 3);
        assert_eq!(provider.get_float("ratio").unwrap(), 1.5);
        assert!(provider.get_bool("enabled").unwrap());
        assert!(provider.get_int("broken").is_err());
        assert!(provider.get_bool("broken").is_err());
        assert_eq!(provider.get_int_or("broken", 7), 7);
        assert_eq!(provider.get_string_or("absent", "x"), "x");
    }

    #[test]
    fn env_names_join_prefix_namespace_and_key() {
        let provider = EnvConfigProvider::new().with_prefix("INSIGHT").with_namespace("ORACLE");
        assert_eq!(provider.variable_name("api_key"), "INSIGHT_ORACLE_API_KEY");
        assert_eq!(provider.variable_name("base-url"), "INSIGHT_ORACLE_BASE_URL");
        assert_eq!(EnvConfigProvider::new().variable_name("database_url"), "DATABASE_URL");
    }

    #[test]
    fn composite_prefers_earlier_providers() {
        let first = MemoryConfigProvider::with_values(HashMap::from([("model".to_string(), "a".to_string())]));
        let mut second = MemoryConfigProvider::new();
        second.set("model", "b");
        second.set("timeout", 9);

        let mut provider = CompositeConfigProvider::new();
        provider.add_provider(first);
        provider.add_provider(second);

        assert_eq!(provider.get_string("model").unwrap(), "a");
        assert_eq!(provider.get_int("timeout").unwrap(), 9);
        assert!(provider.get_string("missing").is_err());
    }

    #[test]
    fn oracle_config_from_provider() {
        let mut provider = MemoryConfigProvider::new();
        provider.set("oracle_api_key", "sk-test");
        provider.set("oracle_base_url", "https://oracle.test/v1");
        provider.set("oracle_temperature", "0.5");

        let config = OracleConfig::from_provider(&provider).unwrap();
        assert_eq!(config.base_url, "https://oracle.test/v1");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.timeout_seconds, 30);
        assert!((config.temperature - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn oracle_config_requires_key() {
        assert!(OracleConfig::from_provider(&MemoryConfigProvider::new()).is_err());

        let config = OracleConfig {
            model: " ".into(),
            api_key: "sk".into(),
            ..OracleConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
