//! PostgreSQL-backed structured store

use async_trait::async_trait;
use log::{debug, info};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::guard::ensure_select;
use crate::{ColumnInfo, StructuredStore};

/// Structured store over a PostgreSQL schema
pub struct PostgresStore {
    pool: PgPool,
    schema: String,
    max_rows: usize,
}

impl PostgresStore {
    /// Connect eagerly using the given configuration
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await?;

        info!("Connected structured store (schema {})", config.schema);
        Ok(Self::with_pool(pool, config))
    }

    /// Wrap an existing pool
    pub fn with_pool(pool: PgPool, config: &StoreConfig) -> Self {
        Self {
            pool,
            schema: config.schema.clone(),
            max_rows: config.max_rows,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

/// Wrap a validated SELECT so the result arrives as one JSON array,
/// capped at `$1` rows.
pub(crate) fn wrap_for_json(statement: &str) -> String {
    format!(
        "SELECT COALESCE(json_agg(row_to_json(q)), '[]'::json) \
         FROM (SELECT * FROM ({}) AS inner_q LIMIT $1) AS q",
        statement
    )
}

#[async_trait]
impl StructuredStore for PostgresStore {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT table_name::text
            FROM information_schema.tables
            WHERE table_schema = $1 AND table_type = 'BASE TABLE'
            ORDER BY table_name
            "#,
        )
        .bind(&self.schema)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            r#"
            SELECT column_name::text, data_type::text, is_nullable::text
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2
            ORDER BY ordinal_position
            "#,
        )
        .bind(&self.schema)
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Err(StoreError::TableNotFound(table.to_string()));
        }

        Ok(rows
            .into_iter()
            .map(|(name, data_type, nullable)| ColumnInfo {
                name,
                data_type,
                nullable: nullable.eq_ignore_ascii_case("YES"),
            })
            .collect())
    }

    async fn query(&self, sql: &str) -> Result<Vec<Value>> {
        let statement = ensure_select(sql)?;
        let wrapped = wrap_for_json(statement);
        debug!("Running read-only query: {}", statement);

        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await?;

        let (rows,): (Value,) = sqlx::query_as(&wrapped)
            .bind(self.max_rows as i64)
            .fetch_one(&mut *tx)
            .await?;

        tx.rollback().await?;

        match rows {
            Value::Array(items) => Ok(items),
            other => Err(StoreError::Serialization(format!(
                "expected a JSON array of rows, got {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_statement_with_row_cap() {
        let sql = wrap_for_json("SELECT device_id FROM telemetry_readings");
        assert!(sql.contains("(SELECT device_id FROM telemetry_readings) AS inner_q"));
        assert!(sql.contains("LIMIT $1"));
        assert!(sql.starts_with("SELECT COALESCE(json_agg(row_to_json(q)), '[]'::json)"));
    }
}
