//! A store paired with the embedder that feeds it.
//!
//! [`Collection`] is the handle the indexer and pipeline work against. It
//! embeds text on the way in ([`upsert`](Collection::upsert)) and on the way
//! out ([`query`](Collection::query)), so both sides always go through the
//! same provider. [`Collection::open`] enforces that invariant across runs:
//! the store remembers the [`EmbeddingProfile`] it was first indexed with and
//! refuses to open with a different one.

use anyhow::{anyhow, bail, Context, Result};

use crate::embedding::{embed_one, DistanceMetric, Embedder, EmbeddingProfile};
use crate::error::{RagError, RagResult};
use crate::models::{Item, ItemMetadata, Match};
use crate::store::Store;

pub struct Collection<'a> {
    store: &'a dyn Store,
    embedder: &'a dyn Embedder,
    metric: DistanceMetric,
}

impl std::fmt::Debug for Collection<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("model", &self.embedder.model_name())
            .field("dims", &self.embedder.dims())
            .field("metric", &self.metric)
            .finish()
    }
}

impl<'a> Collection<'a> {
    /// Open a collection over `store`, checking its recorded profile.
    ///
    /// A store without a recorded profile adopts the current one. A store
    /// with a different profile fails with [`RagError::EmbeddingMismatch`];
    /// an unreachable store fails with [`RagError::StoreUnavailable`].
    pub async fn open(
        store: &'a dyn Store,
        embedder: &'a dyn Embedder,
        metric: DistanceMetric,
    ) -> RagResult<Collection<'a>> {
        let configured = EmbeddingProfile::of(embedder, metric);

        let recorded = store
            .embedding_profile()
            .await
            .map_err(|e| RagError::store("could not read embedding profile", e))?;

        match recorded {
            Some(recorded) if recorded != configured => {
                return Err(RagError::EmbeddingMismatch {
                    recorded: recorded.to_string(),
                    configured: configured.to_string(),
                });
            }
            Some(_) => {}
            None => {
                tracing::info!(profile = %configured, "recording embedding profile");
                store
                    .set_embedding_profile(&configured)
                    .await
                    .map_err(|e| RagError::store("could not record embedding profile", e))?;
            }
        }

        Ok(Self {
            store,
            embedder,
            metric,
        })
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn profile(&self) -> EmbeddingProfile {
        EmbeddingProfile::of(self.embedder, self.metric)
    }

    pub async fn count(&self) -> Result<usize> {
        self.store.count().await
    }

    pub async fn get(&self, id: &str) -> Result<Option<Item>> {
        self.store.get_item(id).await
    }

    pub async fn items(&self) -> Result<Vec<Item>> {
        self.store.list_items().await
    }

    /// Embed `text` and insert or overwrite the item `id`.
    pub async fn upsert(&self, id: &str, text: &str, metadata: ItemMetadata) -> Result<()> {
        let item = Item {
            id: id.to_string(),
            text: text.to_string(),
            metadata,
        };
        self.upsert_batch(std::slice::from_ref(&item)).await
    }

    /// Embed all items in one provider call and upsert them.
    ///
    /// Nothing is written unless every vector has the expected length.
    pub async fn upsert_batch(&self, items: &[Item]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let texts: Vec<String> = items.iter().map(|item| item.text.clone()).collect();
        let vectors = self
            .embedder
            .embed(&texts)
            .await
            .with_context(|| format!("embedding {} items", items.len()))?;

        if vectors.len() != items.len() {
            bail!(
                "embedding provider returned {} vectors for {} texts",
                vectors.len(),
                items.len()
            );
        }

        for vector in &vectors {
            self.check_dims(vector)?;
        }
        for (item, vector) in items.iter().zip(vectors.iter()) {
            self.store.upsert_item(item, vector).await?;
        }
        Ok(())
    }

    /// Return up to `n` items closest to `query_text`, ascending by distance.
    pub async fn query(&self, query_text: &str, n: usize) -> Result<Vec<Match>> {
        let query_vec = embed_one(self.embedder, query_text)
            .await
            .context("embedding query")?;
        self.check_dims(&query_vec)?;
        self.store.nearest(&query_vec, n, self.metric).await
    }

    fn check_dims(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.embedder.dims() {
            return Err(anyhow!(
                "embedding has {} dims, {} expects {}",
                vector.len(),
                self.embedder.model_name(),
                self.embedder.dims()
            ));
        }
        Ok(())
    }
}
