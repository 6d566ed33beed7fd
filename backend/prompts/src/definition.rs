use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use taxwise_core::{LlmRequest, TaxwiseError};
use taxwise_llm::{parse_structured, CompletionService};

use crate::template::PromptTemplate;

/// Input types check themselves before anything is sent to the model.
pub trait ValidateInput {
    fn validate(&self) -> Result<(), TaxwiseError>;
}

/// A named prompt: template, output shape, and generation settings.
#[derive(Debug, Clone, Copy)]
pub struct PromptDefinition {
    pub name: &'static str,
    /// Name of the declared output shape (sent to providers that want one).
    pub schema_name: &'static str,
    pub system_prompt: &'static str,
    pub template: PromptTemplate,
    pub output_schema: fn() -> Value,
    /// Pin a model for this prompt; `None` lets the service decide.
    pub model: Option<&'static str>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Validate `input`, render the prompt, call the model once and parse the reply.
#[instrument(skip(service, definition, input), fields(prompt = definition.name))]
pub async fn run_prompt<I, O>(
    service: &CompletionService,
    definition: &PromptDefinition,
    input: &I,
) -> Result<O, TaxwiseError>
where
    I: Serialize + ValidateInput,
    O: DeserializeOwned,
{
    input.validate()?;

    let vars = serde_json::to_value(input)
        .map_err(|e| TaxwiseError::Validation(format!("input is not serializable: {e}")))?;
    let rendered = definition.template.render(&vars)?;

    let request = LlmRequest {
        model: service.resolve_model(definition.model, !rendered.images.is_empty()),
        system_prompt: definition.system_prompt.to_string(),
        user_prompt: rendered.text,
        images: rendered.images,
        response_schema: Some((definition.output_schema)()),
        schema_name: Some(definition.schema_name.to_string()),
        max_tokens: definition.max_tokens,
        temperature: definition.temperature,
    };

    debug!(model = %request.model, images = request.images.len(), "Prompt rendered");

    let response = service.complete(&request).await?;
    parse_structured(&response.content)
}
