pub mod providers;
pub mod service;
pub mod structured;

pub use providers::ProviderRegistry;
pub use service::{CompletionService, DEFAULT_TIMEOUT};
pub use structured::{extract_json_payload, parse_structured};
