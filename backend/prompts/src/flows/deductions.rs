//! Personalized deduction and credit suggestions from the extracted record.

use serde_json::{json, Value};

use taxwise_core::{DeductionInput, DeductionSuggestions, TaxwiseError};
use taxwise_llm::CompletionService;

use crate::definition::{run_prompt, PromptDefinition, ValidateInput};
use crate::template::PromptTemplate;

pub const DEDUCTION_PROMPT: PromptDefinition = PromptDefinition {
    name: "personalizedDeductionSuggestionsPrompt",
    schema_name: "personalizedDeductionSuggestions",
    system_prompt: "",
    template: PromptTemplate::new(
        r#"You are a tax advisor. Analyze the following tax form data and user information to suggest potential deductions and credits.

Tax Form Data: {{{extractedData}}}
User Information: {{{userInfo}}}

Provide a list of suggestions and warnings based on the data. If no user info is provided, assume a generic tax payer.

Output in JSON format:
{
  "suggestions": ["..."],
  "warnings": ["..."]
}
"#,
    ),
    output_schema,
    model: None,
    max_tokens: 2048,
    temperature: 0.3,
};

fn output_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "suggestions": {
                "type": "array",
                "items": { "type": "string" },
                "description": "A list of personalized deduction suggestions."
            },
            "warnings": {
                "type": "array",
                "items": { "type": "string" },
                "description": "A list of potential red flags or inconsistencies."
            }
        },
        "required": ["suggestions"],
        "additionalProperties": false
    })
}

impl ValidateInput for DeductionInput {
    fn validate(&self) -> Result<(), TaxwiseError> {
        if self.extracted_data.trim().is_empty() {
            return Err(TaxwiseError::Validation("extractedData must not be empty".into()));
        }
        Ok(())
    }
}

/// Suggest deductions and credits for the record.
pub async fn personalized_deduction_suggestions(
    service: &CompletionService,
    input: &DeductionInput,
) -> Result<DeductionSuggestions, TaxwiseError> {
    run_prompt(service, &DEDUCTION_PROMPT, input).await
}
