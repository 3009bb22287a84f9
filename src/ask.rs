//! `rag ask`: the full retrieval-augmented pipeline on the console.
//!
//! Prints the query and the retrieved rules as a distance table, then opens
//! the completion and streams the grounded answer to stdout fragment by
//! fragment. The table is printed before the chat provider is contacted.

use std::io::Write;

use anyhow::Result;
use tsa_rag_core::chat::ChatProvider;
use tsa_rag_core::collection::Collection;
use tsa_rag_core::pipeline::{
    complete, format_match_row, forward_stream, retrieve, GroundedPrompt, MATCH_TABLE_HEADER,
};

pub async fn run_ask(
    collection: &Collection<'_>,
    chat: &dyn ChatProvider,
    query: &str,
    k: usize,
    model: &str,
) -> Result<()> {
    let mut out = std::io::stdout();
    ask_to(collection, chat, query, k, model, &mut out).await
}

/// [`run_ask`] writing to `out` instead of stdout.
pub async fn ask_to<W: Write>(
    collection: &Collection<'_>,
    chat: &dyn ChatProvider,
    query: &str,
    k: usize,
    model: &str,
    out: &mut W,
) -> Result<()> {
    let result = retrieve(collection, query, k).await?;

    writeln!(out, "Search query: {}", query)?;
    writeln!(out, "\nRetrieved rules:")?;
    writeln!(out, "{}", MATCH_TABLE_HEADER)?;
    for (i, m) in result.matches.iter().enumerate() {
        writeln!(out, "{}", format_match_row(i + 1, m))?;
    }
    out.flush()?;

    let prompt = GroundedPrompt::from_result(&result);
    let fragments = complete(query, &prompt, chat, model).await?;

    writeln!(out, "\nChat response:")?;
    let streamed = forward_stream(fragments, &mut *out).await;
    // Terminate the partial line even when the stream failed.
    writeln!(out)?;

    let fragments = streamed?;
    tracing::info!(fragments, "answer complete");
    Ok(())
}
