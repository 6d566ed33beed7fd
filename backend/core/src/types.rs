use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::data_uri::DataUri;
use crate::error::TaxwiseError;

/// An uploaded tax document image, held as a data URI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedDocument {
    pub id: Uuid,
    pub data_uri: DataUri,
    pub file_name: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

impl UploadedDocument {
    /// Wrap a data URI; only `image/*` payloads are accepted.
    pub fn new(data_uri: DataUri, file_name: Option<String>) -> Result<Self, TaxwiseError> {
        if !data_uri.is_image() {
            return Err(TaxwiseError::InvalidDocument(format!(
                "expected an image, got '{}'",
                data_uri.mime_type()
            )));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            data_uri,
            file_name,
            uploaded_at: Utc::now(),
        })
    }

    /// Encode raw image bytes into a document.
    pub fn from_bytes(
        mime_type: &str,
        bytes: &[u8],
        file_name: Option<String>,
    ) -> Result<Self, TaxwiseError> {
        Self::new(DataUri::from_bytes(mime_type, bytes), file_name)
    }
}

/// The hand-editable JSON text describing the form fields.
///
/// Never parsed into a structured type beyond syntax checks; it is passed to
/// the model verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractedRecord(String);

impl ExtractedRecord {
    /// Accept `text` only if it is syntactically valid JSON.
    pub fn parse(text: impl Into<String>) -> Result<Self, TaxwiseError> {
        let text = text.into();
        serde_json::from_str::<serde_json::Value>(&text)?;
        Ok(Self(text))
    }

    /// Wrap text without validating it.
    pub fn unchecked(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExtractedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The three independent analyses run for each document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    Simplification,
    Deductions,
    Risk,
}

impl InsightKind {
    /// Tab label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Simplification => "Simplification",
            Self::Deductions => "Deductions",
            Self::Risk => "Risk Assessment",
        }
    }

    /// Title of the notification raised when this insight fails.
    pub fn error_title(&self) -> &'static str {
        match self {
            Self::Simplification => "Simplification Error",
            Self::Deductions => "Deduction Suggestion Error",
            Self::Risk => "Risk Assessment Error",
        }
    }
}

impl fmt::Display for InsightKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Simplification => "simplification",
            Self::Deductions => "deductions",
            Self::Risk => "risk",
        };
        f.write_str(s)
    }
}

/// Lifecycle of one insight kind for the current document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InsightState<T> {
    Idle,
    Loading,
    Succeeded { value: T },
    Failed { message: String },
}

impl<T> Default for InsightState<T> {
    fn default() -> Self {
        Self::Idle
    }
}

impl<T> InsightState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Succeeded { value } => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed { message } => Some(message),
            _ => None,
        }
    }
}

/// Input for the plain-language explanation prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimplificationInput {
    /// `data:<mimetype>;base64,<encoded_data>`
    pub photo_data_uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimplificationOutput {
    pub simplified_explanation: String,
}

/// Input for the deduction suggestions prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeductionInput {
    /// The record as JSON text.
    pub extracted_data: String,
    /// Optional context such as age or occupation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_info: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeductionSuggestions {
    pub suggestions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
}

/// Input for the risk assessment prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskInput {
    pub extracted_data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub risk_assessment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub red_flags: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_requires_image() {
        let pdf = DataUri::from_bytes("application/pdf", b"%PDF");
        assert!(UploadedDocument::new(pdf, None).is_err());

        let png = UploadedDocument::from_bytes("image/png", b"\x89PNG", Some("w2.png".into())).unwrap();
        assert_eq!(png.data_uri.mime_type(), "image/png");
    }

    #[test]
    fn test_record_parse() {
        assert!(ExtractedRecord::parse(r#"{"a":1}"#).is_ok());
        assert!(ExtractedRecord::parse("{not json").is_err());
    }

    #[test]
    fn test_insight_state_serialization() {
        let state: InsightState<SimplificationOutput> = InsightState::Succeeded {
            value: SimplificationOutput {
                simplified_explanation: "Box 1 is your wages.".into(),
            },
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["status"], "succeeded");
        assert_eq!(json["value"]["simplifiedExplanation"], "Box 1 is your wages.");

        let idle = serde_json::to_value(InsightState::<RiskAssessment>::Idle).unwrap();
        assert_eq!(idle, serde_json::json!({"status": "idle"}));
    }

    #[test]
    fn test_optional_lists_deserialize_when_absent() {
        let out: DeductionSuggestions =
            serde_json::from_str(r#"{"suggestions":["Consider X"]}"#).unwrap();
        assert_eq!(out.warnings, None);

        let risk: RiskAssessment =
            serde_json::from_str(r#"{"riskAssessment":"Low","redFlags":["Mismatch"]}"#).unwrap();
        assert_eq!(risk.red_flags.unwrap(), vec!["Mismatch"]);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(InsightKind::Risk.to_string(), "risk");
        assert_eq!(InsightKind::Deductions.error_title(), "Deduction Suggestion Error");
    }
}
