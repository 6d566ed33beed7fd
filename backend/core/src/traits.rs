use anyhow::Result;
use async_trait::async_trait;

use crate::data_uri::DataUri;

/// Trait for remote completion services (Gemini, OpenRouter, Ollama, ...).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., "gemini", "ollama").
    fn name(&self) -> &str;

    /// Send a completion request and return the response text.
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse>;
}

/// An image attached to a completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    pub mime_type: String,
    /// Base64 payload without the `data:` header.
    pub data_base64: String,
}

impl ImageInput {
    /// Re-assemble the image as a data URI (OpenAI-style `image_url` parts).
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data_base64)
    }
}

impl From<&DataUri> for ImageInput {
    fn from(uri: &DataUri) -> Self {
        Self {
            mime_type: uri.mime_type().to_string(),
            data_base64: uri.data().to_string(),
        }
    }
}

/// Request to an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub images: Vec<ImageInput>,
    /// JSON schema the response must conform to, when structured output is wanted.
    pub response_schema: Option<serde_json::Value>,
    /// Name of the schema, used by providers that require one.
    pub schema_name: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl LlmRequest {
    pub fn new(model: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: String::new(),
            user_prompt: user_prompt.into(),
            images: Vec::new(),
            response_schema: None,
            schema_name: None,
            max_tokens: 2048,
            temperature: 0.2,
        }
    }
}

/// Response from an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub provider: String,
    pub model: String,
    pub tokens_used: u64,
    pub latency_ms: u64,
}
