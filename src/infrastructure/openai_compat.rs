//! OpenAI-compatible chat completions client
//!
//! Works against any server exposing `POST <base>/chat/completions`
//! (OpenAI, Ollama, LM Studio, vLLM). When a partial-text sink is given the
//! request is streamed and server-sent events are decoded as they arrive.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::application::ports::outbound::{
    ChatMessage, LlmError, LlmPort, LlmRequest, PartialTextSink,
};

/// Client for an OpenAI-compatible API
pub struct OpenAiCompatClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiCompatClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    async fn send(
        &self,
        request: &LlmRequest,
        stream: bool,
    ) -> Result<reqwest::Response, OpenAiCompatError> {
        let body = CompletionRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
        };

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(OpenAiCompatError::ApiError(provider_message(status, &error_text)));
        }
        Ok(response)
    }

    /// Non-streaming completion
    pub async fn complete(&self, request: &LlmRequest) -> Result<String, OpenAiCompatError> {
        let response: CompletionResponse = self.send(request, false).await?.json().await?;
        Ok(response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }

    /// Streaming completion; `on_partial` receives the accumulated text after each delta
    pub async fn complete_streaming(
        &self,
        request: &LlmRequest,
        on_partial: PartialTextSink,
    ) -> Result<String, OpenAiCompatError> {
        let response = self.send(request, true).await?;
        let mut stream = response.bytes_stream();
        let mut decoder = SseLineDecoder::default();
        let mut full = String::new();

        while let Some(chunk) = stream.next().await {
            for line in decoder.push(&chunk?) {
                if let Some(delta) = parse_sse_line(&line) {
                    full.push_str(&delta);
                    on_partial(&full);
                }
            }
        }
        if let Some(delta) = decoder.finish().as_deref().and_then(parse_sse_line) {
            full.push_str(&delta);
            on_partial(&full);
        }

        tracing::debug!(model = %request.model, chars = full.chars().count(), "Stream finished");
        Ok(full)
    }
}

#[async_trait]
impl LlmPort for OpenAiCompatClient {
    async fn generate(
        &self,
        request: LlmRequest,
        on_partial: Option<PartialTextSink>,
    ) -> Result<String, LlmError> {
        let result = match on_partial {
            Some(sink) => self.complete_streaming(&request, sink).await,
            None => self.complete(&request).await,
        };
        result.map_err(|e| {
            tracing::warn!(model = %request.model, error = %e, "Chat completion failed");
            LlmError::from(e)
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OpenAiCompatError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {0}")]
    ApiError(String),
}

impl From<OpenAiCompatError> for LlmError {
    fn from(e: OpenAiCompatError) -> Self {
        match e {
            OpenAiCompatError::HttpError(e) if e.is_decode() => LlmError::InvalidResponse(e.to_string()),
            OpenAiCompatError::HttpError(e) => LlmError::Transport(e.to_string()),
            OpenAiCompatError::ApiError(message) => LlmError::Provider(message),
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// The provider's `error.message` when the body carries one, else the status
fn provider_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| format!("status {}", status))
}

/// Splits a byte stream into lines
///
/// Bytes are buffered until a newline so a multi-byte character split
/// across chunks is decoded whole.
#[derive(Debug, Default)]
struct SseLineDecoder {
    buffer: Vec<u8>,
}

impl SseLineDecoder {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line).trim().to_string());
        }
        lines
    }

    fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.buffer).trim().to_string();
        self.buffer.clear();
        Some(line)
    }
}

/// Content delta carried by one SSE line, if any
///
/// Non-data lines, `[DONE]` and malformed payloads yield nothing.
fn parse_sse_line(line: &str) -> Option<String> {
    let payload = line.trim().strip_prefix("data: ")?;
    if payload == "[DONE]" {
        return None;
    }
    let chunk: StreamChunk = serde_json::from_str(payload).ok()?;
    chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|d| !d.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sse_line() {
        assert_eq!(
            parse_sse_line(r#"data: {"choices":[{"delta":{"content":"你好"}}]}"#),
            Some("你好".to_string())
        );
        assert_eq!(parse_sse_line("data: [DONE]"), None);
        assert_eq!(parse_sse_line("data: {not json"), None);
        assert_eq!(parse_sse_line(": keep-alive"), None);
        assert_eq!(parse_sse_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#), None);
        assert_eq!(parse_sse_line(r#"data: {"choices":[]}"#), None);
    }

    #[test]
    fn test_decoder_joins_split_characters() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"剑\"}}]}\n";
        let bytes = line.as_bytes();
        let split = bytes.iter().position(|b| *b >= 0x80).unwrap() + 1;

        let mut decoder = SseLineDecoder::default();
        assert!(decoder.push(&bytes[..split]).is_empty());
        let lines = decoder.push(&bytes[split..]);
        assert_eq!(lines.len(), 1);
        assert_eq!(parse_sse_line(&lines[0]), Some("剑".to_string()));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_decoder_keeps_partial_line_until_finish() {
        let mut decoder = SseLineDecoder::default();
        let lines = decoder.push(b"data: [DONE]\r\ndata: {\"choices\"");
        assert_eq!(lines, vec!["data: [DONE]".to_string()]);
        assert_eq!(decoder.finish(), Some("data: {\"choices\"".to_string()));
    }

    #[test]
    fn test_provider_message() {
        let status = reqwest::StatusCode::UNAUTHORIZED;
        assert_eq!(
            provider_message(status, r#"{"error":{"message":"Invalid API key","type":"auth"}}"#),
            "Invalid API key"
        );
        assert_eq!(provider_message(status, "<html>"), "status 401 Unauthorized");
    }

    #[test]
    fn test_error_mapping() {
        let err: LlmError = OpenAiCompatError::ApiError("quota exceeded".to_string()).into();
        assert!(matches!(err, LlmError::Provider(ref m) if m == "quota exceeded"));
    }

    #[test]
    fn test_request_body_shape() {
        let request = LlmRequest::new(vec![ChatMessage::system("规则"), ChatMessage::user("开始")], "gpt-4o-mini")
            .with_temperature(0.5)
            .with_max_tokens(2048);
        let body = CompletionRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: true,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "开始");
        assert_eq!(json["max_tokens"], 2048);
        assert_eq!(json["stream"], true);
    }
}
