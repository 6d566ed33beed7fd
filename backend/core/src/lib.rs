pub mod data_uri;
pub mod error;
pub mod event;
pub mod traits;
pub mod types;

pub use data_uri::{detect_image_mime_type, is_image, DataUri};
pub use error::TaxwiseError;
pub use event::{Notification, NotificationVariant};
pub use traits::{ImageInput, LlmProvider, LlmRequest, LlmResponse};
pub use types::{
    DeductionInput, DeductionSuggestions, ExtractedRecord, InsightKind, InsightState, RiskAssessment,
    RiskInput, SimplificationInput, SimplificationOutput, UploadedDocument,
};
