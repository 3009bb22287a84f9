//! Chat-completion provider trait and message types.
//!
//! A [`ChatProvider`] opens a streamed completion and hands back a
//! [`TextStream`]: a single-pass, forward-only stream of text fragments in
//! arrival order. The stream ends when the provider signals completion.
//! Dropping it early closes the underlying connection.

use std::pin::Pin;

use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

/// Streamed completion: text fragments as the provider produces them.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider name for logs (e.g. `"openai"`).
    fn name(&self) -> &str;

    /// Open a streamed completion of `messages` with `model`.
    ///
    /// Errors returned here mean the stream never started; errors yielded
    /// by the stream mean it failed partway.
    async fn stream_chat(&self, model: &str, messages: &[ChatMessage]) -> Result<TextStream>;
}
