//! `rag index`: load the corpus and upsert it into the store.

use std::path::Path;

use anyhow::Result;
use tsa_rag_core::collection::Collection;
use tsa_rag_core::index::{index_corpus, IndexOptions, IndexReport};

use crate::config::Config;
use crate::corpus;

/// Index the configured corpus (or `corpus_override`) into `collection`.
///
/// Without `force`, a populated collection is left untouched.
pub async fn run_index(
    config: &Config,
    collection: &Collection<'_>,
    corpus_override: Option<&Path>,
    force: bool,
) -> Result<IndexReport> {
    let path = corpus_override.unwrap_or(config.corpus.path.as_path());
    let lines = corpus::load_corpus(path)?;

    let options = IndexOptions {
        force,
        batch_size: config.embedding.batch_size,
    };
    let report = index_corpus(&lines, collection, &options).await?;

    if report.skipped {
        println!(
            "Collection already holds {} items; nothing indexed (use --force to re-index).",
            report.total
        );
    } else {
        println!(
            "Indexed {} items from {} ({} total).",
            report.upserted,
            path.display(),
            report.total
        );
    }

    Ok(report)
}
