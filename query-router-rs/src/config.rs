use log::warn;
use oracle_sdk::config::{ConfigProvider, ConfigProviderExt, DEFAULT_PROVIDER};

use crate::classifier::ClassifierMode;
use crate::response::ResponseFormat;

/// Query engine settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    pub mode: ClassifierMode,
    pub format: ResponseFormat,
    /// Ask the oracle when no keyword rule matches
    pub oracle_classification: bool,
    /// Tables described when gathering schema for the oracle
    pub max_schema_tables: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            mode: ClassifierMode::Hybrid,
            format: ResponseFormat::Text,
            oracle_classification: true,
            max_schema_tables: 5,
        }
    }
}

impl RouterConfig {
    /// Read `router_mode`, `router_format`, `router_oracle_classification`
    /// and `router_max_schema_tables`; bad values fall back to defaults.
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Self {
        let defaults = Self::default();

        let mode = match provider.get_string("router_mode") {
            Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
                "standard" => ClassifierMode::Standard,
                "hybrid" => ClassifierMode::Hybrid,
                other => {
                    warn!("Unknown router mode '{}', using {}", other, defaults.mode);
                    defaults.mode
                }
            },
            Err(_) => defaults.mode,
        };

        let format = match provider.get_string("router_format") {
            Ok(value) if value.trim().eq_ignore_ascii_case("json") => ResponseFormat::Json,
            Ok(value) if value.trim().eq_ignore_ascii_case("text") => ResponseFormat::Text,
            Ok(value) => {
                warn!("Unknown response format '{}', using text", value);
                defaults.format
            }
            Err(_) => defaults.format,
        };

        Self {
            mode,
            format,
            oracle_classification: provider
                .get_bool_or("router_oracle_classification", defaults.oracle_classification),
            max_schema_tables: provider
                .get_int_or("router_max_schema_tables", defaults.max_schema_tables as i64)
                .max(1) as usize,
        }
    }

    /// Load from `INSIGHT_ROUTER_*` environment variables
    pub fn from_env() -> Self {
        Self::from_provider(&**DEFAULT_PROVIDER)
    }
}
