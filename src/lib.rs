//! # TSA RAG
//!
//! A retrieval-augmented assistant for TSA baggage rules.
//!
//! A corpus of one-line rules is embedded into a SQLite-backed vector store.
//! Questions are answered by retrieving the closest rules and streaming a chat
//! completion that is instructed to answer only from them.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────┐
//! │   Corpus    │──▶│   Indexer   │──▶│  SQLite  │
//! │ rules.txt   │   │ label+embed │   │  items   │
//! └─────────────┘   └─────────────┘   └────┬─────┘
//!                                          │ top-k
//!                                          ▼
//!                 ┌──────────┐       ┌──────────┐
//!                 │  stdout  │◀──────│   Chat   │
//!                 │ (stream) │       │ grounded │
//!                 └──────────┘       └──────────┘
//! ```
//!
//! The runtime-agnostic pieces (data model, traits, indexer, pipeline) live
//! in the `tsa-rag-core` crate; this crate supplies the SQLite store, HTTP
//! and local providers, and the `rag` CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite [`Store`](tsa_rag_core::store::Store) implementation |
//! | [`embedding`] | Embedding providers (OpenAI, Ollama, local) |
//! | [`chat`] | Streaming chat providers (OpenAI, Ollama) |
//! | [`http`] | Shared HTTP client and retry |
//! | [`corpus`] | Corpus file loading |
//! | [`index_cmd`] | `rag index` |
//! | [`search`] | `rag search` |
//! | [`ask`] | `rag ask` |
//! | [`stats`] | `rag stats` |

pub mod ask;
pub mod chat;
pub mod config;
pub mod corpus;
pub mod db;
pub mod embedding;
pub mod http;
pub mod index_cmd;
pub mod migrate;
pub mod search;
pub mod sqlite_store;
pub mod stats;
