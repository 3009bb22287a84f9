//! Corpus indexer.
//!
//! Turns corpus lines into [`Item`]s and upserts them into a
//! [`Collection`]. A populated collection is left alone unless the caller
//! forces a re-index, so running the indexer on every start is safe.
//!
//! # Line handling
//!
//! - Each line is trimmed; its label is the text before the first `.`.
//! - The item id is the 1-based line number.
//! - Blank lines are skipped but still consume a line number, so ids always
//!   equal line numbers.

use crate::collection::Collection;
use crate::error::{RagError, RagResult};
use crate::models::Item;

#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Re-upsert every line even if the collection already holds items.
    pub force: bool,
    /// Number of lines embedded per provider call.
    pub batch_size: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            force: false,
            batch_size: 64,
        }
    }
}

/// Outcome of an indexing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexReport {
    /// Items upserted by this run (0 when skipped).
    pub upserted: usize,
    /// Items in the collection after the run.
    pub total: usize,
    /// True when the collection was already populated and nothing was written.
    pub skipped: bool,
}

/// Build items from raw corpus lines.
pub fn prepare_items<S: AsRef<str>>(lines: &[S]) -> Vec<Item> {
    lines
        .iter()
        .enumerate()
        .filter_map(|(i, line)| Item::from_line(i + 1, line.as_ref()))
        .collect()
}

/// Index `lines` into `collection`.
///
/// Returns the number of items stored afterwards. Store and embedding
/// failures surface as [`RagError::StoreUnavailable`].
pub async fn index_corpus<S: AsRef<str>>(
    lines: &[S],
    collection: &Collection<'_>,
    options: &IndexOptions,
) -> RagResult<IndexReport> {
    let existing = collection
        .count()
        .await
        .map_err(|e| RagError::store("could not count stored items", e))?;

    if existing > 0 && !options.force {
        tracing::info!(count = existing, "collection already populated, skipping indexing");
        return Ok(IndexReport {
            upserted: 0,
            total: existing,
            skipped: true,
        });
    }

    let items = prepare_items(lines);
    tracing::info!(lines = lines.len(), items = items.len(), "indexing corpus");

    for batch in items.chunks(options.batch_size.max(1)) {
        collection.upsert_batch(batch).await.map_err(|e| {
            RagError::store(
                format!(
                    "could not upsert items {}..={}",
                    batch[0].id,
                    batch[batch.len() - 1].id
                ),
                e,
            )
        })?;
        tracing::debug!(count = batch.len(), "upserted batch");
    }

    let total = collection
        .count()
        .await
        .map_err(|e| RagError::store("could not count stored items", e))?;

    Ok(IndexReport {
        upserted: items.len(),
        total,
        skipped: false,
    })
}
