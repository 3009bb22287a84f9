//! `rag search`: retrieval only, printed as a detailed match table.

use anyhow::Result;
use tsa_rag_core::collection::Collection;
use tsa_rag_core::models::QueryResult;
use tsa_rag_core::pipeline::{format_match_detail, retrieve};

/// Print the `limit` closest rules to `query`.
pub async fn run_search(
    collection: &Collection<'_>,
    query: &str,
    limit: usize,
) -> Result<QueryResult> {
    let result = retrieve(collection, query, limit).await?;

    println!("Search query: {}", query);
    if result.is_empty() {
        println!("No results.");
        return Ok(result);
    }

    for (i, m) in result.matches.iter().enumerate() {
        println!("{}", format_match_detail(i + 1, m));
    }

    Ok(result)
}
