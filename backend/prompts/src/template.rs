//! Handlebars-style prompt templates.
//!
//! `{{{field}}}` inserts the raw value of an input field; `{{media url=field}}`
//! attaches the field's data URI as an image part instead of inlining it.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use taxwise_core::{DataUri, ImageInput, TaxwiseError};

static FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}\}").unwrap());
static MEDIA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{media\s+url=([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap());

/// Marker left in the prompt text where an image was attached.
pub const MEDIA_MARKER: &str = "[attached image]";

/// A fixed prompt pattern.
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    source: &'static str,
}

/// Template output: prompt text plus any attached images.
#[derive(Debug, Clone)]
pub struct RenderedPrompt {
    pub text: String,
    pub images: Vec<ImageInput>,
}

impl PromptTemplate {
    pub const fn new(source: &'static str) -> Self {
        Self { source }
    }

    /// Substitute the fields of `vars` (a JSON object) into the template.
    ///
    /// Absent or null fields render as an empty string. A media placeholder
    /// whose field is not a valid data URI is a validation error.
    pub fn render(&self, vars: &Value) -> Result<RenderedPrompt, TaxwiseError> {
        let mut images = Vec::new();
        let mut media_error = None;

        let with_media = MEDIA_RE.replace_all(self.source, |caps: &Captures| {
            let field = &caps[1];
            let raw = vars.get(field).and_then(Value::as_str).unwrap_or_default();
            match DataUri::parse(raw) {
                Ok(uri) => {
                    images.push(ImageInput::from(&uri));
                    MEDIA_MARKER.to_string()
                }
                Err(e) => {
                    media_error.get_or_insert_with(|| {
                        TaxwiseError::Validation(format!("field '{field}': {e}"))
                    });
                    String::new()
                }
            }
        });

        if let Some(err) = media_error {
            return Err(err);
        }

        let text = FIELD_RE
            .replace_all(&with_media, |caps: &Captures| match vars.get(&caps[1]) {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            })
            .into_owned();

        Ok(RenderedPrompt { text, images })
    }
}
