//! SQLite-based persistent blob store
//!
//! Stores full agent results as JSON text. Rows are keyed by the
//! `(tenant_id, job_id, agent_id)` triple; the encoded blob key is kept
//! alongside for reference.
//! Uses SQLx for async database operations.

use crate::error::Result;
use aeo_core::{BlobRef, BlobStore};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};

/// SQLite-backed store for agent artifacts
pub struct SqliteBlobStore {
    pool: SqlitePool,
}

impl SqliteBlobStore {
    /// Create a new SQLite store with the given database URL
    ///
    /// URL format: `sqlite:///path/to/db.sqlite` or `sqlite::memory:`
    pub async fn new(url: &str) -> Result<Self> {
        info!("Initializing SQLite blob store: {}", url);

        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // An in-memory database lives and dies with its connection
        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        let store = Self { pool };
        store.initialize_schema().await?;

        info!("SQLite blob store initialized successfully");
        Ok(store)
    }

    /// Create an in-memory store for testing
    pub async fn in_memory() -> Result<Self> {
        Self::new("sqlite::memory:").await
    }

    async fn initialize_schema(&self) -> Result<()> {
        debug!("Initializing database schema");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS agent_artifacts (
                tenant_id TEXT NOT NULL,
                job_id TEXT NOT NULL,
                agent_id TEXT NOT NULL,
                key TEXT NOT NULL,
                data TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (tenant_id, job_id, agent_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_artifacts_job ON agent_artifacts(tenant_id, job_id)",
        )
        .execute(&self.pool)
        .await?;

        debug!("Database schema initialized");
        Ok(())
    }

    async fn put_artifact(
        &self,
        tenant_id: &str,
        job_id: &str,
        agent_id: &str,
        data: &Value,
    ) -> Result<BlobRef> {
        let key = BlobRef::new(tenant_id, job_id, agent_id);
        let json = serde_json::to_string(data)?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO agent_artifacts
                (key, tenant_id, job_id, agent_id, data, size_bytes, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(tenant_id, job_id, agent_id) DO UPDATE SET
                key = excluded.key,
                data = excluded.data,
                size_bytes = excluded.size_bytes,
                created_at = excluded.created_at
            "#,
        )
        .bind(key.as_str())
        .bind(tenant_id)
        .bind(job_id)
        .bind(agent_id)
        .bind(&json)
        .bind(json.len() as i64)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        debug!(key = %key, size_bytes = json.len(), "Stored agent artifact");
        Ok(key)
    }

    async fn get_artifact(
        &self,
        tenant_id: &str,
        job_id: &str,
        agent_id: &str,
    ) -> Result<Option<Value>> {
        let row = sqlx::query(
            "SELECT data FROM agent_artifacts WHERE tenant_id = ? AND job_id = ? AND agent_id = ?",
        )
        .bind(tenant_id)
        .bind(job_id)
        .bind(agent_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let json: String = row.get("data");
                Ok(Some(serde_json::from_str(&json)?))
            }
            None => Ok(None),
        }
    }

    /// List the agent ids with stored artifacts for a job
    pub async fn list_job_artifacts(&self, tenant_id: &str, job_id: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT agent_id FROM agent_artifacts \
             WHERE tenant_id = ? AND job_id = ? ORDER BY agent_id",
        )
        .bind(tenant_id)
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("agent_id")).collect())
    }

    /// Delete every artifact of a job, returning the number removed
    pub async fn purge_job(&self, tenant_id: &str, job_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM agent_artifacts WHERE tenant_id = ? AND job_id = ?")
            .bind(tenant_id)
            .bind(job_id)
            .execute(&self.pool)
            .await?;

        info!(tenant_id, job_id, removed = result.rows_affected(), "Purged job artifacts");
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl BlobStore for SqliteBlobStore {
    async fn put(
        &self,
        tenant_id: &str,
        job_id: &str,
        agent_id: &str,
        data: &Value,
    ) -> aeo_core::Result<BlobRef> {
        Ok(self.put_artifact(tenant_id, job_id, agent_id, data).await?)
    }

    async fn get(
        &self,
        tenant_id: &str,
        job_id: &str,
        agent_id: &str,
    ) -> aeo_core::Result<Option<Value>> {
        Ok(self.get_artifact(tenant_id, job_id, agent_id).await?)
    }
}
