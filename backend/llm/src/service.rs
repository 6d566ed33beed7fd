//! Single-attempt completion calls with a bounded wait.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use taxwise_core::{LlmProvider, LlmRequest, LlmResponse, TaxwiseError};

/// Default upper bound on one remote call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// The remote completion service as seen by the prompt clients.
///
/// Calls are made exactly once; an expired timeout is reported as
/// [`TaxwiseError::Timeout`] and treated like any other remote failure.
#[derive(Clone)]
pub struct CompletionService {
    provider: Arc<dyn LlmProvider>,
    default_model: String,
    vision_model: Option<String>,
    timeout: Duration,
}

impl CompletionService {
    pub fn new(provider: Arc<dyn LlmProvider>, default_model: impl Into<String>) -> Self {
        Self {
            provider,
            default_model: default_model.into(),
            vision_model: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Model used for requests that carry images.
    pub fn with_vision_model(mut self, model: impl Into<String>) -> Self {
        self.vision_model = Some(model.into());
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Pick the model for a request: explicit override, else vision model for
    /// image requests, else the default.
    pub fn resolve_model(&self, requested: Option<&str>, has_images: bool) -> String {
        if let Some(model) = requested {
            return model.to_string();
        }
        if has_images {
            if let Some(model) = &self.vision_model {
                return model.clone();
            }
        }
        self.default_model.clone()
    }

    /// Send one request and wait at most `timeout` for the answer.
    pub async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, TaxwiseError> {
        let provider = self.provider.name().to_string();
        debug!(provider = %provider, model = %request.model, "Calling provider");

        match tokio::time::timeout(self.timeout, self.provider.complete(request)).await {
            Ok(Ok(response)) => {
                info!(
                    provider = %response.provider,
                    tokens = response.tokens_used,
                    latency_ms = response.latency_ms,
                    "Provider responded"
                );
                Ok(response)
            }
            Ok(Err(e)) => {
                warn!(provider = %provider, error = %e, "Provider failed");
                Err(TaxwiseError::Provider {
                    provider,
                    message: format!("{e:#}"),
                })
            }
            Err(_) => {
                warn!(provider = %provider, timeout_secs = self.timeout.as_secs(), "Provider timed out");
                Err(TaxwiseError::Timeout {
                    seconds: self.timeout.as_secs(),
                })
            }
        }
    }
}
