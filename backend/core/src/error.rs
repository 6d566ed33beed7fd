use thiserror::Error;

/// Top-level error type for TaxWise.
#[derive(Debug, Error)]
pub enum TaxwiseError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("LLM provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    #[error("LLM request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("model output did not match the expected shape: {0}")]
    MalformedOutput(String),

    #[error("no LLM provider configured: {0}")]
    NoProvider(String),

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TaxwiseError {
    /// Whether this failure came from (or on the way to) the remote completion service.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::Provider { .. } | Self::Timeout { .. } | Self::MalformedOutput(_) | Self::NoProvider(_)
        )
    }
}

impl From<serde_json::Error> for TaxwiseError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidJson(err.to_string())
    }
}
