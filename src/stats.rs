//! Database statistics.
//!
//! `rag stats` reports how many rules are indexed and which embedding
//! profile the store was built with. It reads the database directly and
//! never constructs an embedding provider, so it works offline.

use anyhow::Result;
use tsa_rag_core::store::Store;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let count = store.count().await?;
    let profile = store.embedding_profile().await?;
    let items = store.list_items().await?;
    store.close().await;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    let mut distinct: Vec<&str> = items.iter().map(|item| item.label()).collect();
    distinct.sort_unstable();
    distinct.dedup();

    println!("TSA RAG Database Stats");
    println!("=======================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Items:       {}", count);
    println!("  Labels:      {}", distinct.len());
    match profile {
        Some(profile) => println!("  Embedding:   {}", profile),
        None => println!("  Embedding:   (none recorded)"),
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
