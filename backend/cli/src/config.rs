use std::path::PathBuf;
use std::time::Duration;

/// TaxWise runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server bind address
    pub bind_address: String,
    /// HTTP server port
    pub port: u16,
    /// Provider name; `None` picks one from the available credentials
    pub provider: Option<String>,
    pub gemini_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
    /// Ollama base URL
    pub ollama_url: String,
    /// Model for every prompt; `None` uses the provider's default
    pub model: Option<String>,
    /// Model for the image prompt, when it differs
    pub vision_model: Option<String>,
    /// Per-call timeout in seconds
    pub timeout_secs: u64,
    /// Directory for rolling NDJSON logs
    pub log_dir: Option<PathBuf>,
    pub log_json: bool,
    /// Log level
    pub log_level: String,
    /// Name offered for record downloads
    pub export_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 9002,
            provider: None,
            gemini_api_key: None,
            openrouter_api_key: None,
            ollama_url: "http://localhost:11434".to_string(),
            model: None,
            vision_model: None,
            timeout_secs: 60,
            log_dir: None,
            log_json: false,
            log_level: "info".to_string(),
            export_name: taxwise_session::DEFAULT_EXPORT_NAME.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            bind_address: non_empty("TAXWISE_BIND").unwrap_or(defaults.bind_address),
            port: non_empty("TAXWISE_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            provider: non_empty("TAXWISE_PROVIDER").map(|p| p.to_lowercase()),
            gemini_api_key: non_empty("GEMINI_API_KEY").or_else(|| non_empty("GOOGLE_API_KEY")),
            openrouter_api_key: non_empty("OPENROUTER_API_KEY"),
            ollama_url: non_empty("OLLAMA_URL").unwrap_or(defaults.ollama_url),
            model: non_empty("TAXWISE_MODEL"),
            vision_model: non_empty("TAXWISE_VISION_MODEL"),
            timeout_secs: non_empty("TAXWISE_TIMEOUT_SECS")
                .and_then(|t| t.parse().ok())
                .filter(|t| *t > 0)
                .unwrap_or(defaults.timeout_secs),
            log_dir: non_empty("TAXWISE_LOG_DIR").map(PathBuf::from),
            log_json: non_empty("TAXWISE_LOG_JSON")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            export_name: non_empty("TAXWISE_EXPORT_NAME").unwrap_or(defaults.export_name),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The provider to use: explicit choice first, then whichever key is set.
    pub fn provider_name(&self) -> String {
        if let Some(provider) = &self.provider {
            return provider.clone();
        }
        if self.gemini_api_key.is_some() {
            "gemini".to_string()
        } else if self.openrouter_api_key.is_some() {
            "openrouter".to_string()
        } else {
            "ollama".to_string()
        }
    }

    /// The configured model, or one the selected provider actually serves.
    pub fn model_name(&self) -> String {
        if let Some(model) = &self.model {
            return model.clone();
        }
        default_model(&self.provider_name()).to_string()
    }
}

/// Default multimodal model per provider.
fn default_model(provider: &str) -> &'static str {
    match provider {
        "openrouter" => "google/gemini-2.0-flash-001",
        "ollama" => "llava",
        "mock" => "mock",
        _ => "gemini-2.0-flash",
    }
}
