//! Shared HTTP plumbing for the hosted providers.
//!
//! # Retry Strategy
//!
//! [`send_with_retry`] retries the request that *opens* a call:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! Once a streamed response has started, nothing is retried.

use anyhow::{anyhow, bail, Result};
use std::time::Duration;

/// Build a client with the given overall request timeout.
pub fn client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Build a client for streamed responses.
///
/// `idle_timeout_secs` bounds connecting and each wait for more body bytes,
/// never the whole response, so long answers are not cut off.
pub fn streaming_client(idle_timeout_secs: u64) -> Result<reqwest::Client> {
    let idle = Duration::from_secs(idle_timeout_secs);
    Ok(reqwest::Client::builder()
        .connect_timeout(idle)
        .read_timeout(idle)
        .build()?)
}

/// Delay before retry number `attempt` (1-based).
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.saturating_sub(1).min(5))
}

/// Send the request produced by `build`, retrying transient failures.
///
/// `label` names the API in errors and logs (e.g. `"OpenAI"`). Returns the
/// first successful response.
pub async fn send_with_retry<F>(label: &str, max_retries: u32, build: F) -> Result<reqwest::Response>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = backoff_delay(attempt);
            tracing::warn!(
                api = label,
                attempt,
                delay_secs = delay.as_secs(),
                "retrying after transient error"
            );
            tokio::time::sleep(delay).await;
        }

        match build().send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response);
                }

                let body_text = response.text().await.unwrap_or_default();

                // Rate limited or server error: retry
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(anyhow!("{} API error {}: {}", label, status, body_text));
                    continue;
                }

                // Client error (not 429): fail now
                bail!("{} API error {}: {}", label, status, body_text);
            }
            Err(e) => {
                last_err = Some(anyhow!("{} connection error: {}", label, e));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("{} request failed after retries", label)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_then_caps() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
        assert_eq!(backoff_delay(4), Duration::from_secs(8));
        assert_eq!(backoff_delay(6), Duration::from_secs(32));
        assert_eq!(backoff_delay(10), Duration::from_secs(32));
    }

    /// Serve one response whose body trickles out over `chunks * gap`.
    async fn trickle_server(chunks: usize, gap: Duration) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nConnection: close\r\n\r\n")
                .await
                .unwrap();
            for i in 0..chunks {
                socket.write_all(format!("line {}\n", i).as_bytes()).await.unwrap();
                socket.flush().await.unwrap();
                tokio::time::sleep(gap).await;
            }
        });
        format!("http://{}/stream", addr)
    }

    async fn read_body(client: &reqwest::Client, url: &str) -> Result<String> {
        use futures::StreamExt;

        let response = client.get(url).send().await?;
        let mut body = response.bytes_stream();
        let mut text = String::new();
        while let Some(chunk) = body.next().await {
            text.push_str(std::str::from_utf8(&chunk?)?);
        }
        Ok(text)
    }

    #[tokio::test]
    async fn test_streaming_client_outlives_idle_timeout() {
        let url = trickle_server(4, Duration::from_millis(400)).await;
        let client = streaming_client(1).unwrap();
        let body = read_body(&client, &url).await.unwrap();
        assert_eq!(body, "line 0\nline 1\nline 2\nline 3\n");
    }

    #[tokio::test]
    async fn test_total_timeout_cuts_long_body() {
        let url = trickle_server(4, Duration::from_millis(400)).await;
        let client = client(1).unwrap();
        assert!(read_body(&client, &url).await.is_err());
    }

    #[tokio::test]
    async fn test_connection_error_exhausts_retries() {
        let client = client(1).unwrap();
        // Port 9 on localhost: nothing listens there in test environments.
        let err = send_with_retry("Local", 0, || client.get("http://127.0.0.1:9/nothing"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Local connection error"));
    }
}
