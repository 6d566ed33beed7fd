//! Audit-risk narrative and red flags for the extracted record.

use serde_json::{json, Value};

use taxwise_core::{RiskAssessment, RiskInput, TaxwiseError};
use taxwise_llm::CompletionService;

use crate::definition::{run_prompt, PromptDefinition, ValidateInput};
use crate::template::PromptTemplate;

pub const RISK_PROMPT: PromptDefinition = PromptDefinition {
    name: "assessTaxFormRiskPrompt",
    schema_name: "assessTaxFormRisk",
    system_prompt: "",
    template: PromptTemplate::new(
        "You are a meticulous tax compliance reviewer. Review the following tax form data for potential audit risks, inconsistencies between related fields, and unusual values.

Tax Form Data: {{{extractedData}}}

Write a short risk assessment in plain language, then list each specific red flag you found. If nothing stands out, say so and return no red flags.",
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
            "riskAssessment": {
                "type": "string",
                "description": "An overall assessment of audit risk for the form data."
            },
            "redFlags": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Specific red flags or inconsistencies."
            }
        },
        "required": ["riskAssessment"],
        "additionalProperties": false
    })
}

impl ValidateInput for RiskInput {
    fn validate(&self) -> Result<(), TaxwiseError> {
        if self.extracted_data.trim().is_empty() {
            return Err(TaxwiseError::Validation("extractedData must not be empty".into()));
        }
        Ok(())
    }
}

/// Assess audit risk for the record.
pub async fn assess_tax_form_risk(
    service: &CompletionService,
    input: &RiskInput,
) -> Result<RiskAssessment, TaxwiseError> {
    run_prompt(service, &RISK_PROMPT, input).await
}
