//! Plain-language explanation of an uploaded tax form image.

use serde_json::{json, Value};

use taxwise_core::{DataUri, SimplificationInput, SimplificationOutput, TaxwiseError};
use taxwise_llm::CompletionService;

use crate::definition::{run_prompt, PromptDefinition, ValidateInput};
use crate::template::PromptTemplate;

pub const SIMPLIFICATION_PROMPT: PromptDefinition = PromptDefinition {
    name: "taxFormSimplificationPrompt",
    schema_name: "taxFormSimplification",
    system_prompt: "",
    template: PromptTemplate::new(
        "You are an AI tax assistant that simplifies complex tax forms into plain language.

You will be provided with a photo of a tax form. Extract the text from the tax form and translate complex tax jargon into simple, plain language. Explain the purpose of each field and highlight key information.

Tax Form Photo: {{media url=photoDataUri}}",
    ),
    output_schema,
    model: None,
    max_tokens: 2048,
    temperature: 0.2,
};

fn output_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "simplifiedExplanation": {
                "type": "string",
                "description": "A simplified explanation of the tax form."
            }
        },
        "required": ["simplifiedExplanation"],
        "additionalProperties": false
    })
}

impl ValidateInput for SimplificationInput {
    fn validate(&self) -> Result<(), TaxwiseError> {
        let uri = DataUri::parse(&self.photo_data_uri)
            .map_err(|e| TaxwiseError::Validation(format!("photoDataUri: {e}")))?;
        if !uri.is_image() {
            return Err(TaxwiseError::Validation(format!(
                "photoDataUri: expected an image MIME type, got '{}'",
                uri.mime_type()
            )));
        }
        Ok(())
    }
}

/// Explain the form in the photo in plain language.
pub async fn tax_form_simplification(
    service: &CompletionService,
    input: &SimplificationInput,
) -> Result<SimplificationOutput, TaxwiseError> {
    run_prompt(service, &SIMPLIFICATION_PROMPT, input).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use taxwise_llm::providers::mock::MockProvider;

    fn input(uri: &str) -> SimplificationInput {
        SimplificationInput {
            photo_data_uri: uri.to_string(),
        }
    }

    #[test]
    fn test_validation() {
        assert!(input("data:image/png;base64,aGVsbG8=").validate().is_ok());
        assert!(input("data:application/pdf;base64,aGVsbG8=").validate().is_err());
        assert!(input("https://example.com/w2.png").validate().is_err());
    }

    #[tokio::test]
    async fn test_image_is_attached_and_output_parsed() {
        let mock = Arc::new(MockProvider::new("mock").with_route(
            "taxFormSimplification",
            r#"{"simplifiedExplanation": "Box 1 shows your wages."}"#,
        ));
        let service = CompletionService::new(mock.clone(), "text-model").with_vision_model("vision-model");

        let out = tax_form_simplification(&service, &input("data:image/png;base64,aGVsbG8="))
            .await
            .unwrap();
        assert_eq!(out.simplified_explanation, "Box 1 shows your wages.");

        let sent = &mock.requests()[0];
        assert_eq!(sent.model, "vision-model");
        assert_eq!(sent.images.len(), 1);
        assert!(!sent.user_prompt.contains("base64"));
        assert!(sent.response_schema.is_some());
    }

    #[tokio::test]
    async fn test_invalid_input_is_not_sent() {
        let mock = Arc::new(MockProvider::new("mock"));
        let service = CompletionService::new(mock.clone(), "m");
        let err = tax_form_simplification(&service, &input("garbage"))
            .await
            .unwrap_err();
        assert!(matches!(err, TaxwiseError::Validation(_)));
        assert_eq!(mock.call_count(), 0);
    }
}
