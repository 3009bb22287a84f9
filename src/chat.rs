//! Streaming chat-completion providers.
//!
//! - **[`OpenAIChat`]**: `POST {url}/chat/completions` with `stream: true`;
//!   the body is server-sent events terminated by `data: [DONE]`.
//! - **[`OllamaChat`]**: `POST {url}/api/chat` with `stream: true`; the body
//!   is newline-delimited JSON terminated by an object with `"done": true`.
//!
//! Both decode the response body incrementally into a [`TextStream`] of
//! content fragments. Only the request that opens the stream is retried.

use std::pin::Pin;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use futures::{Stream, StreamExt};

use tsa_rag_core::chat::{ChatMessage, ChatProvider, TextStream};

use crate::config::ChatConfig;
use crate::embedding::openai_api_key;
use crate::http;

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1";
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

/// One decoded line of a streamed completion body.
#[derive(Debug, PartialEq, Eq)]
enum StreamEvent {
    Text(String),
    /// Keep-alives, role headers, empty deltas.
    Skip,
    Done,
}

// ============ OpenAI Provider ============

pub struct OpenAIChat {
    base_url: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIChat {
    /// # Errors
    ///
    /// Returns an error if `OPENAI_API_KEY` is not in the environment.
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let api_key = openai_api_key()?;
        let base_url = config
            .url
            .clone()
            .unwrap_or_else(|| OPENAI_DEFAULT_URL.to_string());
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            max_retries: config.max_retries,
            client: http::streaming_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl ChatProvider for OpenAIChat {
    fn name(&self) -> &str {
        "openai"
    }

    async fn stream_chat(&self, model: &str, messages: &[ChatMessage]) -> Result<TextStream> {
        let body = serde_json::json!({
            "model": model,
            "messages": messages,
            "stream": true,
        });
        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(model, messages = messages.len(), "opening OpenAI chat stream");

        let response = http::send_with_retry("OpenAI", self.max_retries, || {
            self.client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await?;

        Ok(fragments(lines(response.bytes_stream()), parse_sse_line))
    }
}

/// Decode one server-sent-event line from the chat completions stream.
fn parse_sse_line(line: &str) -> Result<StreamEvent> {
    let line = line.trim();
    let data = match line.strip_prefix("data:") {
        Some(data) => data.trim(),
        // Blank separators, comments, `event:`/`id:` fields
        None => return Ok(StreamEvent::Skip),
    };

    if data == "[DONE]" {
        return Ok(StreamEvent::Done);
    }

    let json: serde_json::Value =
        serde_json::from_str(data).map_err(|e| anyhow!("Invalid OpenAI stream chunk: {}", e))?;

    if let Some(error) = json.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error");
        bail!("OpenAI stream error: {}", message);
    }

    let content = json
        .pointer("/choices/0/delta/content")
        .and_then(|c| c.as_str())
        .unwrap_or_default();

    if content.is_empty() {
        Ok(StreamEvent::Skip)
    } else {
        Ok(StreamEvent::Text(content.to_string()))
    }
}

// ============ Ollama Provider ============

pub struct OllamaChat {
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaChat {
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| OLLAMA_DEFAULT_URL.to_string());
        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            client: http::streaming_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl ChatProvider for OllamaChat {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn stream_chat(&self, model: &str, messages: &[ChatMessage]) -> Result<TextStream> {
        let body = serde_json::json!({
            "model": model,
            "messages": messages,
            "stream": true,
        });
        let url = format!("{}/api/chat", self.url);
        tracing::debug!(model, messages = messages.len(), "opening Ollama chat stream");

        let response = http::send_with_retry("Ollama", self.max_retries, || {
            self.client.post(&url).json(&body)
        })
        .await?;

        Ok(fragments(lines(response.bytes_stream()), parse_ollama_line))
    }
}

/// Decode one NDJSON line from Ollama's `/api/chat` stream.
///
/// The terminating object carries `"done": true` and no content.
fn parse_ollama_line(line: &str) -> Result<StreamEvent> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(StreamEvent::Skip);
    }

    let json: serde_json::Value =
        serde_json::from_str(line).map_err(|e| anyhow!("Invalid Ollama stream chunk: {}", e))?;

    if let Some(error) = json.get("error").and_then(|e| e.as_str()) {
        bail!("Ollama stream error: {}", error);
    }

    if json.get("done").and_then(|d| d.as_bool()) == Some(true) {
        return Ok(StreamEvent::Done);
    }

    let content = json
        .pointer("/message/content")
        .and_then(|c| c.as_str())
        .unwrap_or_default();

    if content.is_empty() {
        Ok(StreamEvent::Skip)
    } else {
        Ok(StreamEvent::Text(content.to_string()))
    }
}

// ============ Stream plumbing ============

struct LineReader<S> {
    inner: Pin<Box<S>>,
    buf: Vec<u8>,
    exhausted: bool,
}

/// Split a chunked byte stream into `\n`-terminated lines.
///
/// Chunk boundaries may fall anywhere, including inside a multi-byte
/// character; lines are only decoded once complete. A read error is
/// yielded once and ends the stream.
fn lines<S, B, E>(inner: S) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: std::error::Error + Send + Sync + 'static,
{
    let reader = LineReader {
        inner: Box::pin(inner),
        buf: Vec::new(),
        exhausted: false,
    };

    futures::stream::unfold(reader, |mut reader| async move {
        loop {
            if let Some(pos) = reader.buf.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = reader.buf.drain(..=pos).collect();
                return Some((decode_line(&line[..pos]), reader));
            }

            if reader.exhausted {
                if reader.buf.is_empty() {
                    return None;
                }
                let rest = std::mem::take(&mut reader.buf);
                return Some((decode_line(&rest), reader));
            }

            match reader.inner.next().await {
                Some(Ok(chunk)) => reader.buf.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    reader.exhausted = true;
                    reader.buf.clear();
                    return Some((Err(anyhow::Error::new(e).context("stream read failed")), reader));
                }
                None => reader.exhausted = true,
            }
        }
    })
}

fn decode_line(bytes: &[u8]) -> Result<String> {
    let line = std::str::from_utf8(bytes).map_err(|e| anyhow!("stream line is not UTF-8: {}", e))?;
    Ok(line.trim_end_matches('\r').to_string())
}

/// Turn decoded lines into content fragments, stopping at the end marker.
///
/// A body that ends before its end marker yields a final error, so a
/// dropped connection never passes for a finished answer. The first error
/// ends the stream.
fn fragments<L>(lines: L, parse: fn(&str) -> Result<StreamEvent>) -> TextStream
where
    L: Stream<Item = Result<String>> + Send + 'static,
{
    let truncated = futures::stream::once(futures::future::ready(Err(anyhow!(
        "stream ended before completion marker"
    ))));
    let events = lines
        .map(move |line| line.and_then(|line| parse(&line)))
        .chain(truncated);

    Box::pin(
        events
            .take_while(|event| futures::future::ready(!matches!(event, Ok(StreamEvent::Done))))
            .filter_map(|event| {
                futures::future::ready(match event {
                    Ok(StreamEvent::Text(text)) => Some(Ok(text)),
                    Ok(_) => None,
                    Err(e) => Some(Err(e)),
                })
            })
            .scan(false, |failed, fragment| {
                if *failed {
                    return futures::future::ready(None);
                }
                *failed = fragment.is_err();
                futures::future::ready(Some(fragment))
            }),
    )
}

/// Create the [`ChatProvider`] named by `config.provider`.
pub fn create_chat_provider(config: &ChatConfig) -> Result<Box<dyn ChatProvider>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAIChat::new(config)?)),
        "ollama" => Ok(Box::new(OllamaChat::new(config)?)),
        other => bail!("Unknown chat provider: {}", other),
    }
}
