//! SQLite store behind the core indexer and pipeline.

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use tsa_rag::config::{Config, DbConfig};
use tsa_rag::sqlite_store::SqliteStore;
use tsa_rag_core::collection::Collection;
use tsa_rag_core::embedding::{DistanceMetric, Embedder};
use tsa_rag_core::error::RagError;
use tsa_rag_core::index::{index_corpus, IndexOptions};
use tsa_rag_core::pipeline::retrieve;
use tsa_rag_core::store::Store;

/// One axis per topic keyword; anything else points along the last axis.
struct KeywordEmbedder {
    model: &'static str,
}

const TOPICS: &[&str] = &["firearms", "liquids", "batteries"];

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        self.model
    }

    fn dims(&self) -> usize {
        TOPICS.len() + 1
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                let mut v = vec![0.0f32; TOPICS.len() + 1];
                match TOPICS.iter().position(|t| lower.contains(t)) {
                    Some(axis) => v[axis] = 1.0,
                    None => v[TOPICS.len()] = 1.0,
                }
                v
            })
            .collect())
    }
}

fn test_config(tmp: &TempDir) -> Config {
    Config {
        db: DbConfig {
            path: tmp.path().join("data").join("rag.sqlite"),
        },
        corpus: Default::default(),
        embedding: Default::default(),
        retrieval: Default::default(),
        chat: Default::default(),
    }
}

const CORPUS: &[&str] = &[
    "Firearms. Unloaded firearms may be transported in checked bags only.",
    "Liquids. Carry-on liquids are limited to 3.4oz containers.",
    "",
    "Batteries. Spare lithium batteries must be in carry-on bags.",
];

#[tokio::test]
async fn test_index_and_retrieve() {
    let tmp = TempDir::new().unwrap();
    let store = SqliteStore::open(&test_config(&tmp)).await.unwrap();
    let embedder = KeywordEmbedder { model: "keyword" };
    let collection = Collection::open(&store, &embedder, DistanceMetric::L2)
        .await
        .unwrap();

    let report = index_corpus(CORPUS, &collection, &IndexOptions::default())
        .await
        .unwrap();
    assert_eq!(report.upserted, 3);
    assert_eq!(report.total, 3);

    let result = retrieve(&collection, "rules for firearms", 2).await.unwrap();
    assert_eq!(result.len(), 2);
    assert_eq!(result.matches[0].item.id, "1");
    assert_eq!(result.matches[0].item.label(), "Firearms");
    assert!(result.matches[0].distance <= result.matches[1].distance);

    // Blank line 3 is skipped; batteries keeps line number 4.
    let batteries = store.get_item("4").await.unwrap().unwrap();
    assert_eq!(batteries.position(), 4);
    assert_eq!(batteries.label(), "Batteries");
    assert!(store.get_item("3").await.unwrap().is_none());
}

#[tokio::test]
async fn test_reindex_is_idempotent_and_force_overwrites() {
    let tmp = TempDir::new().unwrap();
    let store = SqliteStore::open(&test_config(&tmp)).await.unwrap();
    let embedder = KeywordEmbedder { model: "keyword" };
    let collection = Collection::open(&store, &embedder, DistanceMetric::L2)
        .await
        .unwrap();

    index_corpus(CORPUS, &collection, &IndexOptions::default())
        .await
        .unwrap();
    let before = store.list_items().await.unwrap();

    let second = index_corpus(CORPUS, &collection, &IndexOptions::default())
        .await
        .unwrap();
    assert!(second.skipped);
    assert_eq!(store.list_items().await.unwrap(), before);

    let mut changed: Vec<&str> = CORPUS.to_vec();
    changed[1] = "Gels. Gels follow the liquids rule.";
    let forced = index_corpus(
        &changed[..],
        &collection,
        &IndexOptions {
            force: true,
            ..IndexOptions::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(forced.total, 3);

    let item = store.get_item("2").await.unwrap().unwrap();
    assert_eq!(item.label(), "Gels");
    assert_eq!(item.text, "Gels. Gels follow the liquids rule.");
}

#[tokio::test]
async fn test_items_persist_across_reopen() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let embedder = KeywordEmbedder { model: "keyword" };

    {
        let store = SqliteStore::open(&config).await.unwrap();
        let collection = Collection::open(&store, &embedder, DistanceMetric::Cosine)
            .await
            .unwrap();
        index_corpus(CORPUS, &collection, &IndexOptions::default())
            .await
            .unwrap();
        store.close().await;
    }

    let store = SqliteStore::open(&config).await.unwrap();
    assert_eq!(store.count().await.unwrap(), 3);
    let profile = store.embedding_profile().await.unwrap().unwrap();
    assert_eq!(profile.model, "keyword");
    assert_eq!(profile.dims, 4);
    assert_eq!(profile.metric, DistanceMetric::Cosine);

    let collection = Collection::open(&store, &embedder, DistanceMetric::Cosine)
        .await
        .unwrap();
    let result = retrieve(&collection, "spare batteries", 1).await.unwrap();
    assert_eq!(result.matches[0].item.label(), "Batteries");
    assert!(result.matches[0].distance.abs() < 1e-6);
}

#[tokio::test]
async fn test_reopen_with_other_model_is_mismatch() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);

    let store = SqliteStore::open(&config).await.unwrap();
    let first = KeywordEmbedder { model: "keyword" };
    Collection::open(&store, &first, DistanceMetric::L2)
        .await
        .unwrap();

    let second = KeywordEmbedder { model: "keyword-v2" };
    let err = Collection::open(&store, &second, DistanceMetric::L2)
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::EmbeddingMismatch { .. }));
}

#[tokio::test]
async fn test_empty_store_returns_no_matches() {
    let tmp = TempDir::new().unwrap();
    let store = SqliteStore::open(&test_config(&tmp)).await.unwrap();
    let embedder = KeywordEmbedder { model: "keyword" };
    let collection = Collection::open(&store, &embedder, DistanceMetric::L2)
        .await
        .unwrap();

    let result = retrieve(&collection, "anything", 5).await.unwrap();
    assert!(result.is_empty());
}
