//! Groq client over the OpenAI-compatible `/chat/completions` endpoint.
//!
//! Only streaming chat is used: the request carries `stream: true` and the response is a
//! server-sent-event body of `data: <chunk json>` lines, ended by `data: [DONE]`.

use crate::llm::{ChatMessage, CompletionBackend, LlmError};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Client for an OpenAI-compatible completion API with bearer auth.
#[derive(Clone)]
pub struct GroqClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GroqClient {
    /// Build a client. `timeout` bounds each whole request when set.
    pub fn new(
        base_url: Option<String>,
        api_key: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, LlmError> {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }
        let mut builder = reqwest::Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        let client = builder.build().map_err(LlmError::Client)?;
        Ok(Self {
            base_url,
            api_key,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl CompletionBackend for GroqClient {
    /// POST /chat/completions with stream: true.
    async fn chat_stream(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        on_chunk: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<(), LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model,
            messages: &messages,
            stream: true,
        };
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("{} {}", status, body)));
        }

        let mut stream = res.bytes_stream();
        let mut decoder = SseDecoder::default();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            for fragment in decoder.push(&chunk)? {
                on_chunk(&fragment);
            }
            if decoder.is_done() {
                return Ok(());
            }
        }
        for fragment in decoder.finish()? {
            on_chunk(&fragment);
        }
        Ok(())
    }
}

/// Incremental decoder for the completion event stream.
///
/// Bytes may arrive split anywhere, including inside a UTF-8 sequence; only complete lines are decoded.
/// Yields non-empty `choices[0].delta.content` fragments. Lines that are not `data:` lines
/// (comments, `event:`, blank separators) are skipped; an undecodable `data:` payload is an error.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    /// Feed bytes; returns the fragments completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<String>, LlmError> {
        let mut out = Vec::new();
        if self.done {
            return Ok(out);
        }
        self.buffer.extend_from_slice(bytes);
        while let Some(i) = self.buffer.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = self.buffer.drain(..i).collect();
            self.buffer.drain(..1);
            self.decode_line(&line_bytes, &mut out)?;
            if self.done {
                self.buffer.clear();
                break;
            }
        }
        Ok(out)
    }

    /// Decode whatever is left once the body has ended (a last line without a trailing newline).
    pub fn finish(&mut self) -> Result<Vec<String>, LlmError> {
        let mut out = Vec::new();
        if !self.done && !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            self.decode_line(&rest, &mut out)?;
        }
        self.done = true;
        Ok(out)
    }

    /// True once `data: [DONE]` has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    fn decode_line(&mut self, line_bytes: &[u8], out: &mut Vec<String>) -> Result<(), LlmError> {
        let line = String::from_utf8_lossy(line_bytes);
        let line = line.trim();
        let Some(data) = line.strip_prefix("data:") else {
            return Ok(());
        };
        let data = data.trim_start();
        if data == "[DONE]" {
            self.done = true;
            return Ok(());
        }
        let chunk: StreamChunk = serde_json::from_str(data)?;
        if let Some(err) = chunk.error {
            return Err(LlmError::Api(stream_error_message(&err)));
        }
        let content = chunk
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.delta)
            .and_then(|d| d.content);
        if let Some(c) = content {
            if !c.is_empty() {
                out.push(c);
            }
        }
        Ok(())
    }
}

/// Provider errors arrive as `{"error": {"message": ...}}`; fall back to the raw JSON.
fn stream_error_message(err: &serde_json::Value) -> String {
    err.get("message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| err.to_string())
}

// --- OpenAI wire types ---

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Option<Vec<StreamChoice>>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}
