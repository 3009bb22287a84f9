//! Error taxonomy for indexing and querying.
//!
//! Collaborator traits ([`Store`](crate::store::Store),
//! [`Embedder`](crate::embedding::Embedder),
//! [`ChatProvider`](crate::chat::ChatProvider)) return `anyhow::Result`.
//! The indexer and pipeline classify those failures into [`RagError`] so
//! callers can tell which stage of a run failed. Every variant is terminal
//! for the current invocation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    /// The corpus source could not be read.
    #[error("corpus unavailable: {message}")]
    CorpusUnavailable {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    /// The store could not be reached, initialized, or written.
    #[error("store unavailable: {message}")]
    StoreUnavailable {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    /// The store was built with a different embedding model, dimensionality,
    /// or distance metric than the one configured now.
    #[error(
        "embedding mismatch: store was indexed with {recorded}, configured provider is {configured}"
    )]
    EmbeddingMismatch { recorded: String, configured: String },

    /// Querying the store failed or returned malformed results.
    #[error("retrieval failed: {message}")]
    RetrievalFailed {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    /// The chat provider failed before or during streaming.
    #[error("completion failed: {message}")]
    CompletionFailed {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl RagError {
    pub fn corpus(message: impl Into<String>, source: anyhow::Error) -> Self {
        Self::CorpusUnavailable {
            message: message.into(),
            source,
        }
    }

    pub fn store(message: impl Into<String>, source: anyhow::Error) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
            source,
        }
    }

    pub fn retrieval(message: impl Into<String>, source: anyhow::Error) -> Self {
        Self::RetrievalFailed {
            message: message.into(),
            source,
        }
    }

    pub fn completion(message: impl Into<String>, source: anyhow::Error) -> Self {
        Self::CompletionFailed {
            message: message.into(),
            source,
        }
    }
}

pub type RagResult<T> = std::result::Result<T, RagError>;
