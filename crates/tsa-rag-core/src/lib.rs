//! # TSA RAG Core
//!
//! Runtime-agnostic logic for TSA RAG: the item model, the store, embedder,
//! and chat-provider traits, the [`Collection`](collection::Collection)
//! handle that ties a store to its embedder, the corpus indexer, and the
//! retrieval-grounding pipeline.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem code. Concrete
//! providers and the persistent store live in the `tsa-rag` app crate.

pub mod chat;
pub mod collection;
pub mod embedding;
pub mod error;
pub mod index;
pub mod models;
pub mod pipeline;
pub mod store;
