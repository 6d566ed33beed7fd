use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use taxwise_core::{LlmProvider, LlmRequest, LlmResponse};

/// OpenRouter.ai provider (OpenAI-compatible chat completions).
pub struct OpenRouterProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenRouterProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    /// Plain string, or an array of content parts when images are attached.
    content: Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: Option<u64>,
}

/// Strict structured output requires every declared property to be listed
/// in `required`, at every nesting level.
fn supports_strict(schema: &Value) -> bool {
    match schema {
        Value::Object(map) => {
            if let Some(Value::Object(properties)) = map.get("properties") {
                let required: Vec<&str> = map
                    .get("required")
                    .and_then(Value::as_array)
                    .map(|r| r.iter().filter_map(Value::as_str).collect())
                    .unwrap_or_default();
                if !properties.keys().all(|k| required.contains(&k.as_str())) {
                    return false;
                }
            }
            map.values().all(supports_strict)
        }
        Value::Array(items) => items.iter().all(supports_strict),
        _ => true,
    }
}

fn build_request(request: &LlmRequest) -> ChatRequest {
    let mut messages = Vec::new();
    if !request.system_prompt.is_empty() {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: Value::String(request.system_prompt.clone()),
        });
    }

    let user_content = if request.images.is_empty() {
        Value::String(request.user_prompt.clone())
    } else {
        let mut parts = vec![json!({ "type": "text", "text": request.user_prompt })];
        parts.extend(request.images.iter().map(|image| {
            json!({ "type": "image_url", "image_url": { "url": image.to_data_uri() } })
        }));
        Value::Array(parts)
    };
    messages.push(ChatMessage {
        role: "user".to_string(),
        content: user_content,
    });

    let response_format = request.response_schema.as_ref().map(|schema| {
        json!({
            "type": "json_schema",
            "json_schema": {
                "name": request.schema_name.as_deref().unwrap_or("output"),
                "strict": supports_strict(schema),
                "schema": schema,
            }
        })
    });

    ChatRequest {
        model: request.model.clone(),
        messages,
        max_tokens: Some(request.max_tokens),
        temperature: Some(request.temperature),
        response_format,
    }
}

#[async_trait]
impl LlmProvider for OpenRouterProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let start = Instant::now();
        let body = build_request(request);

        debug!(
            model = %request.model,
            images = request.images.len(),
            "Sending request to OpenRouter"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .context("OpenRouter HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenRouter returned {}: {}", status, error_body);
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .context("Failed to parse OpenRouter response")?;

        let content = chat_response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        let tokens_used = chat_response
            .usage
            .and_then(|u| u.total_tokens)
            .unwrap_or(0);

        let latency_ms = start.elapsed().as_millis() as u64;

        Ok(LlmResponse {
            content,
            provider: "openrouter".to_string(),
            model: request.model.clone(),
            tokens_used,
            latency_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taxwise_core::ImageInput;

    #[test]
    fn test_text_only_request_uses_string_content() {
        let req = LlmRequest::new("openai/gpt-4o-mini", "Assess this record");
        let body = serde_json::to_value(build_request(&req)).unwrap();
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Assess this record");
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_image_request_uses_content_parts() {
        let mut req = LlmRequest::new("openai/gpt-4o", "Explain");
        req.images.push(ImageInput {
            mime_type: "image/jpeg".into(),
            data_base64: "aGVsbG8=".into(),
        });
        req.response_schema = Some(json!({"type": "object"}));
        req.schema_name = Some("taxFormSimplification".into());

        let body = serde_json::to_value(build_request(&req)).unwrap();
        let parts = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1]["image_url"]["url"], "data:image/jpeg;base64,aGVsbG8=");
        assert_eq!(body["response_format"]["json_schema"]["name"], "taxFormSimplification");
    }

    #[test]
    fn test_strict_only_when_every_property_is_required() {
        let mut req = LlmRequest::new("openai/gpt-4o", "Suggest");
        req.response_schema = Some(json!({
            "type": "object",
            "properties": {
                "suggestions": { "type": "array", "items": { "type": "string" } },
                "warnings": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["suggestions"],
            "additionalProperties": false
        }));
        let body = serde_json::to_value(build_request(&req)).unwrap();
        assert_eq!(body["response_format"]["json_schema"]["strict"], false);

        req.response_schema = Some(json!({
            "type": "object",
            "properties": { "simplifiedExplanation": { "type": "string" } },
            "required": ["simplifiedExplanation"],
            "additionalProperties": false
        }));
        let body = serde_json::to_value(build_request(&req)).unwrap();
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
    }
}
