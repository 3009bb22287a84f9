//! SQLite-backed [`Store`] implementation.
//!
//! Items live in the `items` table with their vector as a little-endian f32
//! BLOB. Nearest-neighbor search loads every vector and ranks in memory,
//! which is plenty for a corpus of a few hundred rules.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use tsa_rag_core::embedding::{blob_to_vec, vec_to_blob, DistanceMetric, EmbeddingProfile};
use tsa_rag_core::models::{Item, ItemMetadata, Match};
use tsa_rag_core::store::{rank_nearest, Store};

use crate::config::Config;
use crate::db;
use crate::migrate;

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to `[db].path` and make sure the schema exists.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn row_to_item(row: &sqlx::sqlite::SqliteRow) -> Result<Item> {
    let position: i64 = row.get("position");
    let position = usize::try_from(position)
        .map_err(|_| anyhow!("item has invalid position {}", position))?;
    Ok(Item {
        id: row.get("id"),
        text: row.get("text"),
        metadata: ItemMetadata {
            position,
            label: row.get("label"),
        },
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn upsert_item(&self, item: &Item, vector: &[f32]) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let metadata_json = serde_json::to_string(&item.metadata)?;

        sqlx::query(
            r#"
            INSERT INTO items (id, position, label, text, metadata_json, embedding, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                position = excluded.position,
                label = excluded.label,
                text = excluded.text,
                metadata_json = excluded.metadata_json,
                embedding = excluded.embedding,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&item.id)
        .bind(item.position() as i64)
        .bind(item.label())
        .bind(&item.text)
        .bind(&metadata_json)
        .bind(vec_to_blob(vector))
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn nearest(
        &self,
        query_vec: &[f32],
        n: usize,
        metric: DistanceMetric,
    ) -> Result<Vec<Match>> {
        let rows = sqlx::query(
            "SELECT id, position, label, text, embedding FROM items ORDER BY position ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.get("embedding");
            candidates.push((row_to_item(row)?, blob_to_vec(&blob)));
        }

        Ok(rank_nearest(
            query_vec,
            candidates
                .iter()
                .map(|(item, vector)| (item.clone(), vector.as_slice())),
            n,
            metric,
        ))
    }

    async fn get_item(&self, id: &str) -> Result<Option<Item>> {
        let row = sqlx::query("SELECT id, position, label, text FROM items WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_item).transpose()
    }

    async fn list_items(&self) -> Result<Vec<Item>> {
        let rows = sqlx::query("SELECT id, position, label, text FROM items ORDER BY position ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_item).collect()
    }

    async fn embedding_profile(&self) -> Result<Option<EmbeddingProfile>> {
        let row = sqlx::query("SELECT model, dims, metric FROM embedding_profile WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let dims: i64 = row.get("dims");
        let metric: String = row.get("metric");
        Ok(Some(EmbeddingProfile {
            model: row.get("model"),
            dims: dims as usize,
            metric: metric.parse()?,
        }))
    }

    async fn set_embedding_profile(&self, profile: &EmbeddingProfile) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO embedding_profile (id, model, dims, metric, created_at)
            VALUES (1, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                model = excluded.model,
                dims = excluded.dims,
                metric = excluded.metric,
                created_at = excluded.created_at
            "#,
        )
        .bind(&profile.model)
        .bind(profile.dims as i64)
        .bind(profile.metric.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
