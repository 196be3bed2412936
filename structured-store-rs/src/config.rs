/// Connection settings for the structured store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database_url: String,
    /// Schema whose tables are exposed
    pub schema: String,
    /// Row cap applied to every query
    pub max_rows: usize,
    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/telemetry".to_string(),
            schema: "public".to_string(),
            max_rows: 200,
            max_connections: 5,
        }
    }
}

impl StoreConfig {
    /// Read `DATABASE_URL`, `STORE_SCHEMA`, `STORE_MAX_ROWS` and
    /// `STORE_MAX_CONNECTIONS`, keeping defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            database_url: std::env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            schema: std::env::var("STORE_SCHEMA").unwrap_or(defaults.schema),
            max_rows: std::env::var("STORE_MAX_ROWS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.max_rows),
            max_connections: std::env::var("STORE_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.max_connections),
        }
    }
}
