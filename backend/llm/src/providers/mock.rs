use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use taxwise_core::{LlmProvider, LlmRequest, LlmResponse};

/// What the mock does when a route matches.
#[derive(Debug, Clone)]
pub enum MockReply {
    Respond(String),
    Fail(String),
}

struct MockRoute {
    needle: String,
    reply: MockReply,
}

/// A mock LLM provider that returns canned responses.
///
/// Routes match on the request's schema name or on a substring of the user
/// prompt; the first match wins, otherwise the fixed response is returned.
pub struct MockProvider {
    name: String,
    fixed_response: Option<String>,
    routes: Vec<MockRoute>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fixed_response: None,
            routes: Vec::new(),
            delay: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.fixed_response = Some(response.into());
        self
    }

    /// Reply with `response` when `needle` matches.
    pub fn with_route(mut self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        self.routes.push(MockRoute {
            needle: needle.into(),
            reply: MockReply::Respond(response.into()),
        });
        self
    }

    /// Fail with `message` when `needle` matches.
    pub fn with_failure(mut self, needle: impl Into<String>, message: impl Into<String>) -> Self {
        self.routes.push(MockRoute {
            needle: needle.into(),
            reply: MockReply::Fail(message.into()),
        });
        self
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of completed or failed calls.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    fn route_for(&self, req: &LlmRequest) -> Option<&MockReply> {
        self.routes
            .iter()
            .find(|route| {
                req.schema_name.as_deref() == Some(route.needle.as_str())
                    || req.user_prompt.contains(&route.needle)
            })
            .map(|route| &route.reply)
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, req: &LlmRequest) -> Result<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut guard) = self.requests.lock() {
            guard.push(req.clone());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let content = match self.route_for(req) {
            Some(MockReply::Fail(message)) => anyhow::bail!("{}", message),
            Some(MockReply::Respond(body)) => body.clone(),
            None => self
                .fixed_response
                .clone()
                .unwrap_or_else(|| "Mock response".to_string()),
        };

        Ok(LlmResponse {
            content,
            provider: self.name.clone(),
            model: "mock".to_string(),
            tokens_used: 0,
            latency_ms: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_routes_by_schema_name() {
        let mock = MockProvider::new("mock")
            .with_response("fallback")
            .with_route("riskAssessment", r#"{"riskAssessment":"low"}"#);

        let mut req = LlmRequest::new("mock", "anything");
        req.schema_name = Some("riskAssessment".into());
        let resp = mock.complete(&req).await.unwrap();
        assert_eq!(resp.content, r#"{"riskAssessment":"low"}"#);

        let other = mock.complete(&LlmRequest::new("mock", "hello")).await.unwrap();
        assert_eq!(other.content, "fallback");
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_failure_route() {
        let mock = MockProvider::new("mock").with_failure("quota", "quota exceeded");
        let err = mock
            .complete(&LlmRequest::new("mock", "this hits quota"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
        assert_eq!(mock.requests().len(), 1);
    }
}
