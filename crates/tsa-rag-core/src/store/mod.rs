//! Storage abstraction for TSA RAG.
//!
//! The [`Store`] trait defines the raw storage operations the indexer and
//! retrieval pipeline need: items with their vectors, exact nearest-neighbor
//! lookup, and the [`EmbeddingProfile`] the store was built with. Stores
//! never compute embeddings themselves; pairing a store with an embedder is
//! the job of [`Collection`](crate::collection::Collection).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::cmp::Ordering;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::{DistanceMetric, EmbeddingProfile};
use crate::models::{Item, Match};

/// Abstract storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`count`](Store::count) | Number of stored items |
/// | [`upsert_item`](Store::upsert_item) | Insert or overwrite an item and its vector, keyed by id |
/// | [`nearest`](Store::nearest) | Up to `n` items ranked by ascending distance |
/// | [`get_item`](Store::get_item) | Fetch one item by id |
/// | [`list_items`](Store::list_items) | All items ordered by position |
/// | [`embedding_profile`](Store::embedding_profile) | Profile recorded at first open |
/// | [`set_embedding_profile`](Store::set_embedding_profile) | Record the profile |
#[async_trait]
pub trait Store: Send + Sync {
    async fn count(&self) -> Result<usize>;

    /// Insert or overwrite the item with `item.id`.
    async fn upsert_item(&self, item: &Item, vector: &[f32]) -> Result<()>;

    /// Return up to `n` items closest to `query_vec`, ascending by distance.
    ///
    /// Equal distances are ordered by ascending item position.
    async fn nearest(
        &self,
        query_vec: &[f32],
        n: usize,
        metric: DistanceMetric,
    ) -> Result<Vec<Match>>;

    async fn get_item(&self, id: &str) -> Result<Option<Item>>;

    async fn list_items(&self) -> Result<Vec<Item>>;

    async fn embedding_profile(&self) -> Result<Option<EmbeddingProfile>>;

    async fn set_embedding_profile(&self, profile: &EmbeddingProfile) -> Result<()>;
}

/// Rank `(item, vector)` candidates against a query and keep the best `n`.
///
/// Shared by the brute-force stores. Candidates are first ordered by
/// position, then stably sorted by distance, so ties keep position order.
pub fn rank_nearest<'a, I>(
    query_vec: &[f32],
    candidates: I,
    n: usize,
    metric: DistanceMetric,
) -> Vec<Match>
where
    I: IntoIterator<Item = (Item, &'a [f32])>,
{
    let mut matches: Vec<Match> = candidates
        .into_iter()
        .map(|(item, vector)| Match {
            distance: metric.distance(query_vec, vector),
            item,
        })
        .collect();

    matches.sort_by_key(|m| m.item.position());
    matches.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(Ordering::Equal)
    });
    matches.truncate(n);
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(pos: usize) -> Item {
        Item::from_line(pos, &format!("Rule{}. text", pos)).unwrap()
    }

    #[test]
    fn test_rank_ascending_and_truncated() {
        let v1 = [0.0f32, 0.0];
        let v2 = [3.0f32, 4.0];
        let v3 = [1.0f32, 0.0];
        let ranked = rank_nearest(
            &[0.0, 0.0],
            vec![(item(1), &v2[..]), (item(2), &v1[..]), (item(3), &v3[..])],
            2,
            DistanceMetric::L2,
        );
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].item.id, "2");
        assert_eq!(ranked[1].item.id, "3");
        assert!(ranked[0].distance <= ranked[1].distance);
    }

    #[test]
    fn test_rank_ties_by_position() {
        let v = [1.0f32, 0.0];
        let ranked = rank_nearest(
            &[0.0, 1.0],
            vec![(item(5), &v[..]), (item(2), &v[..]), (item(9), &v[..])],
            10,
            DistanceMetric::L2,
        );
        let ids: Vec<&str> = ranked.iter().map(|m| m.item.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "5", "9"]);
    }

    #[test]
    fn test_rank_empty() {
        let ranked = rank_nearest(&[1.0], Vec::<(Item, &[f32])>::new(), 5, DistanceMetric::L2);
        assert!(ranked.is_empty());
    }
}
