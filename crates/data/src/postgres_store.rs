//! Hosted-table store: one JSONB record per ticker in PostgreSQL.

use std::collections::BTreeMap;

use async_trait::async_trait;
use calendar_core::{Position, PositionStore};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::schema::{decode_record, encode_record, CURRENT_SCHEMA_VERSION};

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS calendar_positions (
    ticker          TEXT PRIMARY KEY,
    schema_version  INTEGER NOT NULL,
    data            JSONB NOT NULL,
    updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const UPSERT: &str = r#"
INSERT INTO calendar_positions (ticker, schema_version, data, updated_at)
VALUES ($1, $2, $3, NOW())
ON CONFLICT (ticker)
DO UPDATE SET
    schema_version = EXCLUDED.schema_version,
    data = EXCLUDED.data,
    updated_at = EXCLUDED.updated_at
"#;

const UPDATE_IF_CURRENT: &str = r#"
UPDATE calendar_positions
SET schema_version = $2, data = $3, updated_at = NOW()
WHERE ticker = $1 AND COALESCE((data->>'revision')::BIGINT, 0) = $4
"#;

/// Position store backed by the `calendar_positions` table.
#[derive(Debug, Clone)]
pub struct PgPositionStore {
    pool: PgPool,
}

impl PgPositionStore {
    /// Creates a new store over an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects and makes sure the table exists.
    ///
    /// # Errors
    /// Returns an error if the database connection cannot be established.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Creates the table if it does not exist.
    ///
    /// # Errors
    /// Returns an error if the DDL fails.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    /// Loads and decodes every record, ordered by ticker.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn load(&self) -> Result<BTreeMap<String, Position>, StoreError> {
        let rows = sqlx::query("SELECT ticker, data FROM calendar_positions ORDER BY ticker")
            .fetch_all(&self.pool)
            .await?;

        let mut positions = BTreeMap::new();
        for row in rows {
            let ticker: String = row.get("ticker");
            let data: Value = row.get("data");
            match decode_record(&ticker, data) {
                Ok(position) => {
                    positions.insert(ticker, position);
                }
                Err(e) => warn!(ticker, error = %e, "Skipping undecodable position row"),
            }
        }

        debug!(count = positions.len(), "Loaded positions from database");
        Ok(positions)
    }

    async fn upsert_record(&self, ticker: &str, position: &Position) -> Result<(), StoreError> {
        let data = encode_record(position)?;
        sqlx::query(UPSERT)
            .bind(ticker)
            .bind(CURRENT_SCHEMA_VERSION as i32)
            .bind(data)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Rewrites rows still at the loaded revision in one transaction.
    async fn update_batch(&self, positions: &BTreeMap<String, Position>) -> Result<usize, StoreError> {
        if positions.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut written = 0;
        for (ticker, position) in positions {
            let result = sqlx::query(UPDATE_IF_CURRENT)
                .bind(ticker)
                .bind(CURRENT_SCHEMA_VERSION as i32)
                .bind(encode_record(position)?)
                .bind(i64::try_from(position.revision).unwrap_or(i64::MAX))
                .execute(&mut *tx)
                .await?;
            if result.rows_affected() == 0 {
                debug!(ticker, revision = position.revision, "Row changed since load, not written");
            } else {
                written += 1;
            }
        }
        tx.commit().await?;
        Ok(written)
    }

    async fn delete_record(&self, ticker: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM calendar_positions WHERE ticker = $1")
            .bind(ticker)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            debug!(ticker, "Delete of unknown ticker ignored");
        }
        Ok(())
    }
}

#[async_trait]
impl PositionStore for PgPositionStore {
    async fn list(&self) -> anyhow::Result<BTreeMap<String, Position>> {
        Ok(self.load().await?)
    }

    async fn upsert(&self, ticker: &str, position: &Position) -> anyhow::Result<()> {
        Ok(self.upsert_record(ticker, position).await?)
    }

    async fn delete(&self, ticker: &str) -> anyhow::Result<()> {
        Ok(self.delete_record(ticker).await?)
    }

    async fn update_all(&self, positions: &BTreeMap<String, Position>) -> anyhow::Result<usize> {
        Ok(self.update_batch(positions).await?)
    }
}
