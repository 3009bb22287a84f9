//! In-memory [`Store`] implementation for tests and ephemeral runs.
//!
//! Uses a `HashMap` behind `std::sync::RwLock`. Nearest-neighbor search is a
//! brute-force scan over every stored vector.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::{DistanceMetric, EmbeddingProfile};
use crate::models::{Item, Match};

use super::{rank_nearest, Store};

struct StoredItem {
    item: Item,
    vector: Vec<f32>,
}

/// In-memory store.
pub struct InMemoryStore {
    items: RwLock<HashMap<String, StoredItem>>,
    profile: RwLock<Option<EmbeddingProfile>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            profile: RwLock::new(None),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl Store for InMemoryStore {
    async fn count(&self) -> Result<usize> {
        Ok(self.items.read().map_err(poisoned)?.len())
    }

    async fn upsert_item(&self, item: &Item, vector: &[f32]) -> Result<()> {
        let mut items = self.items.write().map_err(poisoned)?;
        items.insert(
            item.id.clone(),
            StoredItem {
                item: item.clone(),
                vector: vector.to_vec(),
            },
        );
        Ok(())
    }

    async fn nearest(
        &self,
        query_vec: &[f32],
        n: usize,
        metric: DistanceMetric,
    ) -> Result<Vec<Match>> {
        let items = self.items.read().map_err(poisoned)?;
        Ok(rank_nearest(
            query_vec,
            items
                .values()
                .map(|stored| (stored.item.clone(), stored.vector.as_slice())),
            n,
            metric,
        ))
    }

    async fn get_item(&self, id: &str) -> Result<Option<Item>> {
        let items = self.items.read().map_err(poisoned)?;
        Ok(items.get(id).map(|stored| stored.item.clone()))
    }

    async fn list_items(&self) -> Result<Vec<Item>> {
        let items = self.items.read().map_err(poisoned)?;
        let mut all: Vec<Item> = items.values().map(|stored| stored.item.clone()).collect();
        all.sort_by_key(|item| item.position());
        Ok(all)
    }

    async fn embedding_profile(&self) -> Result<Option<EmbeddingProfile>> {
        Ok(self.profile.read().map_err(poisoned)?.clone())
    }

    async fn set_embedding_profile(&self, profile: &EmbeddingProfile) -> Result<()> {
        *self.profile.write().map_err(poisoned)? = Some(profile.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_overwrites_by_id() {
        let store = InMemoryStore::new();
        let first = Item::from_line(1, "Knives. Not allowed in carry-on.").unwrap();
        let second = Item::from_line(1, "Scissors. Under 4 inches allowed.").unwrap();

        store.upsert_item(&first, &[1.0, 0.0]).await.unwrap();
        store.upsert_item(&second, &[0.0, 1.0]).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let stored = store.get_item("1").await.unwrap().unwrap();
        assert_eq!(stored.label(), "Scissors");
    }

    #[tokio::test]
    async fn test_nearest_on_empty_store() {
        let store = InMemoryStore::new();
        let matches = store
            .nearest(&[1.0, 0.0], 5, DistanceMetric::L2)
            .await
            .unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_list_items_sorted_by_position() {
        let store = InMemoryStore::new();
        for pos in [3usize, 1, 2] {
            let item = Item::from_line(pos, &format!("R{}. x", pos)).unwrap();
            store.upsert_item(&item, &[pos as f32]).await.unwrap();
        }
        let ids: Vec<String> = store
            .list_items()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_profile_roundtrip() {
        let store = InMemoryStore::new();
        assert!(store.embedding_profile().await.unwrap().is_none());
        let profile = EmbeddingProfile {
            model: "m".to_string(),
            dims: 2,
            metric: DistanceMetric::Cosine,
        };
        store.set_embedding_profile(&profile).await.unwrap();
        assert_eq!(store.embedding_profile().await.unwrap(), Some(profile));
    }
}
