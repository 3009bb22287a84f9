//! Retrieval-augmented query pipeline.
//!
//! # Steps
//!
//! 1. **Retrieve** the `k` closest items with [`retrieve`].
//! 2. **Assemble** their text into a context block, in rank order.
//! 3. **Ground**: embed the context into the fixed assistant instruction
//!    ([`GroundedPrompt`]).
//! 4. **Complete**: send `[system: instruction, user: query]` to the chat
//!    provider, streaming.
//! 5. **Forward** fragments to an output as they arrive ([`forward_stream`]).
//!
//! Nothing here mutates the store, and nothing is retried: any failure ends
//! the query. Fragments already forwarded stay written.

use std::io::Write;

use anyhow::anyhow;
use futures::StreamExt;

use crate::chat::{ChatMessage, ChatProvider, TextStream};
use crate::collection::Collection;
use crate::error::{RagError, RagResult};
use crate::models::{Match, QueryResult};

/// Header printed above [`format_match_row`] lines.
pub const MATCH_TABLE_HEADER: &str = "     Dist.:  | Item:";

/// Fetch the `k` items closest to `query`.
///
/// `k` must be at least 1. A collection holding fewer than `k` items returns
/// all of them.
pub async fn retrieve(
    collection: &Collection<'_>,
    query: &str,
    k: usize,
) -> RagResult<QueryResult> {
    if k == 0 {
        return Err(RagError::retrieval(
            "invalid request",
            anyhow!("k must be >= 1"),
        ));
    }

    let matches = collection
        .query(query, k)
        .await
        .map_err(|e| RagError::retrieval("store query failed", e))?;

    validate_matches(&matches, k)?;
    tracing::debug!(k, found = matches.len(), "retrieved matches");

    Ok(QueryResult {
        query_text: query.to_string(),
        matches,
    })
}

/// Reject result sets a well-behaved store could not have produced.
fn validate_matches(matches: &[Match], k: usize) -> RagResult<()> {
    if matches.len() > k {
        return Err(RagError::retrieval(
            "malformed result",
            anyhow!("store returned {} matches for k = {}", matches.len(), k),
        ));
    }
    if let Some(m) = matches.iter().find(|m| m.distance.is_nan()) {
        return Err(RagError::retrieval(
            "malformed result",
            anyhow!("item {} has a NaN distance", m.item.id),
        ));
    }
    if matches.windows(2).any(|w| w[0].distance > w[1].distance) {
        return Err(RagError::retrieval(
            "malformed result",
            anyhow!("matches are not ordered by ascending distance"),
        ));
    }
    Ok(())
}

/// The system instruction for one query, built from its retrieved rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundedPrompt {
    pub context_block: String,
    pub instruction: String,
}

impl GroundedPrompt {
    pub fn new(context_block: String) -> Self {
        let instruction = build_instruction(&context_block);
        Self {
            context_block,
            instruction,
        }
    }

    pub fn from_result(result: &QueryResult) -> Self {
        Self::new(result.context_block())
    }

    /// The two-message exchange sent to the chat provider.
    pub fn messages(&self, query: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.instruction.clone()),
            ChatMessage::user(query),
        ]
    }
}

fn build_instruction(context_block: &str) -> String {
    format!(
        "You are a helpful airline travel assistant specializing in TSA baggage rules.

These rules might be relevant to the users query:
---
{context_block}
---
Do ONLY answer the users query based on the rules provided.
Do ONLY include rules that are relevant to the users query.
Do NOT include irrelevant rules.

Answer politely, professionally, and concise."
    )
}

/// A retrieved result together with its streaming answer.
pub struct Answer {
    pub result: QueryResult,
    pub prompt: GroundedPrompt,
    /// Answer fragments, consumed once.
    pub fragments: TextStream,
}

/// Run retrieval and grounding, then open the streamed completion.
pub async fn answer(
    query: &str,
    collection: &Collection<'_>,
    chat: &dyn ChatProvider,
    k: usize,
    model: &str,
) -> RagResult<Answer> {
    let result = retrieve(collection, query, k).await?;
    let prompt = GroundedPrompt::from_result(&result);
    let fragments = complete(query, &prompt, chat, model).await?;

    Ok(Answer {
        result,
        prompt,
        fragments,
    })
}

/// Open the streamed completion of `query` under `prompt`.
///
/// A provider that cannot start the stream fails with
/// [`RagError::CompletionFailed`].
pub async fn complete(
    query: &str,
    prompt: &GroundedPrompt,
    chat: &dyn ChatProvider,
    model: &str,
) -> RagResult<TextStream> {
    tracing::info!(provider = chat.name(), model, "requesting completion");
    chat.stream_chat(model, &prompt.messages(query))
        .await
        .map_err(|e| RagError::completion("could not start completion", e))
}

/// Write each fragment to `out` as it arrives, flushing after each one.
///
/// Returns the number of fragments written. A stream error ends forwarding
/// with [`RagError::CompletionFailed`]; fragments already written remain.
pub async fn forward_stream<W: Write + ?Sized>(
    mut fragments: TextStream,
    out: &mut W,
) -> RagResult<usize> {
    let mut written = 0usize;
    while let Some(fragment) = fragments.next().await {
        let fragment = fragment.map_err(|e| {
            RagError::completion(format!("stream failed after {} fragments", written), e)
        })?;
        out.write_all(fragment.as_bytes())
            .and_then(|_| out.flush())
            .map_err(|e| RagError::completion("could not write answer", e.into()))?;
        written += 1;
    }
    Ok(written)
}

/// One line of the retrieval table: `{index:2} | {distance:.5} | {label}`.
///
/// `index` is 1-based.
pub fn format_match_row(index: usize, m: &Match) -> String {
    format!("{:2} | {:.5} | {}", index, m.distance, m.item.label())
}

/// Detailed retrieval line with line number and full text.
pub fn format_match_detail(index: usize, m: &Match) -> String {
    format!(
        "#: {:2} | Distance: {:.5} | Line: {:3} | Item: {:16} | Document: {}",
        index,
        m.distance,
        m.item.position(),
        m.item.label(),
        m.item.text
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Item;

    fn m(pos: usize, text: &str, distance: f32) -> Match {
        Match {
            item: Item::from_line(pos, text).unwrap(),
            distance,
        }
    }

    #[test]
    fn test_instruction_template_verbatim() {
        let prompt = GroundedPrompt::new("Firearms. No loaded firearms.".to_string());
        let expected = "You are a helpful airline travel assistant specializing in TSA baggage rules.\n\
\n\
These rules might be relevant to the users query:\n\
---\n\
Firearms. No loaded firearms.\n\
---\n\
Do ONLY answer the users query based on the rules provided.\n\
Do ONLY include rules that are relevant to the users query.\n\
Do NOT include irrelevant rules.\n\
\n\
Answer politely, professionally, and concise.";
        assert_eq!(prompt.instruction, expected);
    }

    #[test]
    fn test_messages_order() {
        let prompt = GroundedPrompt::new("ctx".to_string());
        let messages = prompt.messages("can I bring a gun");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, crate::chat::ChatRole::System);
        assert!(messages[0].content.contains("---\nctx\n---"));
        assert_eq!(messages[1], ChatMessage::user("can I bring a gun"));
    }

    #[test]
    fn test_from_result_joins_in_match_order() {
        let result = QueryResult {
            query_text: "q".to_string(),
            matches: vec![m(4, "D. four", 0.1), m(1, "A. one", 0.3)],
        };
        let prompt = GroundedPrompt::from_result(&result);
        assert_eq!(prompt.context_block, "D. four\nA. one");
    }

    #[test]
    fn test_validate_rejects_unordered() {
        let matches = vec![m(1, "A. a", 0.5), m(2, "B. b", 0.1)];
        assert!(matches!(
            validate_matches(&matches, 5),
            Err(RagError::RetrievalFailed { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_too_many() {
        let matches = vec![m(1, "A. a", 0.1), m(2, "B. b", 0.2)];
        assert!(validate_matches(&matches, 1).is_err());
        assert!(validate_matches(&matches, 2).is_ok());
    }

    #[test]
    fn test_format_match_row() {
        let row = format_match_row(1, &m(7, "Firearms. Unloaded only.", 0.123456));
        assert_eq!(row, " 1 | 0.12346 | Firearms");
        let row = format_match_row(12, &m(2, "Liquids. 3.4oz.", 1.5));
        assert_eq!(row, "12 | 1.50000 | Liquids");
    }

    #[test]
    fn test_format_match_detail() {
        let line = format_match_detail(3, &m(42, "Knives. Checked bags only.", 0.25));
        assert_eq!(
            line,
            "#:  3 | Distance: 0.25000 | Line:  42 | Item: Knives           | Document: Knives. Checked bags only."
        );
    }
}
