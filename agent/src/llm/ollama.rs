//! Ollama backend over direct HTTP
//!
//! Talks to `/api/chat` with non-streaming requests. Tool definitions and
//! tool calls use the same JSON shape as the request/response types in
//! [`super::types`].

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ChatMessage, ChatRequest, ChatResponse, Llm, ToolCall, ToolSpec};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Information about an available model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub modified_at: String,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    models: Vec<ModelInfo>,
}

/// List available models from Ollama
pub async fn list_models(ollama_url: &str) -> Result<Vec<ModelInfo>> {
    let url = format!("{}/api/tags", normalize_base_url(ollama_url));

    let response = reqwest::Client::new()
        .get(&url)
        .send()
        .await
        .with_context(|| format!("Failed to reach Ollama at {}", url))?;

    if !response.status().is_success() {
        anyhow::bail!("Ollama API error {}", response.status());
    }

    let tags: OllamaTagsResponse = response
        .json()
        .await
        .context("Failed to parse Ollama model list")?;
    Ok(tags.models)
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    tools: &'a [ToolSpec],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<WireOptions>,
}

#[derive(Debug, Serialize)]
struct WireOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

/// Ollama client
pub struct OllamaClient {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    /// Create a new Ollama client
    ///
    /// `timeout` bounds each HTTP round trip, not a whole worker run.
    pub fn new(url: &str, model: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http_client: builder.build().context("Failed to build HTTP client")?,
            base_url: normalize_base_url(url),
            model: model.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Llm for OllamaClient {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let model = request.model.as_deref().unwrap_or(&self.model);
        let body = WireRequest {
            model,
            messages: &request.messages,
            tools: &request.tools,
            stream: false,
            options: request.temperature.map(|temperature| WireOptions { temperature }),
        };

        tracing::debug!(
            model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending chat request"
        );

        let started = Instant::now();
        let url = format!("{}/api/chat", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Failed to send HTTP request to Ollama")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama API error {}: {}", status, body);
        }

        let raw_body = response.text().await.context("Failed to get response text")?;
        let parsed: WireResponse =
            serde_json::from_str(&raw_body).context("Failed to parse Ollama response")?;

        tracing::debug!(
            model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            content_len = parsed.message.content.len(),
            tool_calls = parsed.message.tool_calls.len(),
            "Chat response received"
        );

        Ok(ChatResponse {
            content: parsed.message.content,
            tool_calls: parsed.message.tool_calls,
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Strip trailing slashes and fall back to the default on unparsable input
fn normalize_base_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => parsed.as_str().trim_end_matches('/').to_string(),
        Err(_) => {
            tracing::warn!("Invalid Ollama URL '{}', using {}", url, DEFAULT_OLLAMA_URL);
            DEFAULT_OLLAMA_URL.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url("http://localhost:11434/"), "http://localhost:11434");
        assert_eq!(normalize_base_url("http://gpu-box:11434"), "http://gpu-box:11434");
        assert_eq!(normalize_base_url("not a url"), DEFAULT_OLLAMA_URL);
    }

    #[test]
    fn test_wire_request_shape() {
        let messages = vec![ChatMessage::user("hi")];
        let body = WireRequest {
            model: "qwen3:8b",
            messages: &messages,
            tools: &[],
            stream: false,
            options: Some(WireOptions { temperature: 0.1 }),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "qwen3:8b");
        assert_eq!(json["stream"], false);
        assert!(json.get("tools").is_none());
        assert!((json["options"]["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_wire_response_without_tool_calls() {
        let parsed: WireResponse =
            serde_json::from_str(r#"{"message": {"role": "assistant", "content": "done"}}"#)
                .unwrap();
        assert_eq!(parsed.message.content, "done");
        assert!(parsed.message.tool_calls.is_empty());
    }
}
