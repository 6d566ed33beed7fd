//! The action gateway: the one place where prompt-client failures become data.
//!
//! Callers above this boundary branch on [`ActionResult`], never on error types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use taxwise_core::{
    DeductionInput, DeductionSuggestions, RiskAssessment, RiskInput, SimplificationInput,
    SimplificationOutput, TaxwiseError,
};
use taxwise_llm::CompletionService;

use crate::flows::{assess_tax_form_risk, personalized_deduction_suggestions, tax_form_simplification};

const SIMPLIFICATION_FALLBACK: &str =
    "An unknown error occurred during tax form simplification.";
const DEDUCTIONS_FALLBACK: &str =
    "An unknown error occurred while fetching deduction suggestions.";
const RISK_FALLBACK: &str = "An unknown error occurred during risk assessment.";

/// Either the prompt output or `{"error": "<message>"}` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionResult<T> {
    Error { error: String },
    Success(T),
}

impl<T> ActionResult<T> {
    /// Build a result from a prompt call; errors always carry a non-empty message.
    pub fn from_result(result: Result<T, TaxwiseError>, fallback: &str) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(e) => {
                let message = e.to_string();
                Self::Error {
                    error: if message.trim().is_empty() {
                        fallback.to_string()
                    } else {
                        message
                    },
                }
            }
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

}

/// Remote failures are errors; rejected input only warrants a warning.
fn log_failure<T>(action: &str, result: &Result<T, TaxwiseError>) {
    match result {
        Err(e) if e.is_remote() => error!(action, error = %e, "Action failed"),
        Err(e) => warn!(action, error = %e, "Action rejected its input"),
        Ok(_) => {}
    }
}

/// The three gateway calls the orchestrator issues per document.
#[async_trait]
pub trait InsightActions: Send + Sync {
    async fn simplify_tax_form(&self, input: SimplificationInput) -> ActionResult<SimplificationOutput>;

    async fn suggest_deductions(&self, input: DeductionInput) -> ActionResult<DeductionSuggestions>;

    async fn assess_risk(&self, input: RiskInput) -> ActionResult<RiskAssessment>;
}

/// Gateway backed by the prompt clients and a completion service.
#[derive(Clone)]
pub struct PromptActions {
    service: CompletionService,
}

impl PromptActions {
    pub fn new(service: CompletionService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl InsightActions for PromptActions {
    async fn simplify_tax_form(&self, input: SimplificationInput) -> ActionResult<SimplificationOutput> {
        let result = tax_form_simplification(&self.service, &input).await;
        log_failure("simplify_tax_form", &result);
        ActionResult::from_result(result, SIMPLIFICATION_FALLBACK)
    }

    async fn suggest_deductions(&self, input: DeductionInput) -> ActionResult<DeductionSuggestions> {
        let result = personalized_deduction_suggestions(&self.service, &input).await;
        log_failure("suggest_deductions", &result);
        ActionResult::from_result(result, DEDUCTIONS_FALLBACK)
    }

    async fn assess_risk(&self, input: RiskInput) -> ActionResult<RiskAssessment> {
        let result = assess_tax_form_risk(&self.service, &input).await;
        log_failure("assess_risk", &result);
        ActionResult::from_result(result, RISK_FALLBACK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use taxwise_llm::providers::mock::MockProvider;

    #[test]
    fn test_wire_shape() {
        let ok: ActionResult<DeductionSuggestions> = ActionResult::Success(DeductionSuggestions {
            suggestions: vec!["Consider X".into()],
            warnings: None,
        });
        assert_eq!(serde_json::to_value(&ok).unwrap(), json!({"suggestions": ["Consider X"]}));

        let err: ActionResult<DeductionSuggestions> = ActionResult::Error {
            error: "quota exceeded".into(),
        };
        assert_eq!(serde_json::to_value(&err).unwrap(), json!({"error": "quota exceeded"}));

        let back: ActionResult<RiskAssessment> =
            serde_json::from_value(json!({"error": "boom"})).unwrap();
        assert!(back.is_error());
    }

    #[test]
    fn test_from_result_uses_fallback_for_empty_message() {
        let result: Result<(), TaxwiseError> = Err(TaxwiseError::Other(anyhow::anyhow!("")));
        let tagged = ActionResult::from_result(result, RISK_FALLBACK);
        assert_eq!(
            tagged,
            ActionResult::Error {
                error: RISK_FALLBACK.to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_remote_failure_becomes_error_tag() {
        let mock = Arc::new(
            MockProvider::new("mock").with_failure("assessTaxFormRisk", "upstream exploded"),
        );
        let actions = PromptActions::new(CompletionService::new(mock, "m"));
        let result = actions
            .assess_risk(RiskInput {
                extracted_data: r#"{"a":1}"#.into(),
            })
            .await;
        let ActionResult::Error { error } = &result else {
            panic!("expected an error tag, got {result:?}");
        };
        assert!(error.contains("upstream exploded"));
    }

    #[tokio::test]
    async fn test_validation_failure_becomes_error_tag() {
        let mock = Arc::new(MockProvider::new("mock"));
        let actions = PromptActions::new(CompletionService::new(mock.clone(), "m"));
        let result = actions
            .simplify_tax_form(SimplificationInput {
                photo_data_uri: String::new(),
            })
            .await;
        assert!(result.is_error());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_success_is_returned_unchanged() {
        let mock = Arc::new(MockProvider::new("mock").with_route(
            "personalizedDeductionSuggestions",
            r#"{"suggestions": ["Consider X"], "warnings": []}"#,
        ));
        let actions = PromptActions::new(CompletionService::new(mock, "m"));
        let result = actions
            .suggest_deductions(DeductionInput {
                extracted_data: r#"{"a":1}"#.into(),
                user_info: None,
            })
            .await;
        assert_eq!(
            result,
            ActionResult::Success(DeductionSuggestions {
                suggestions: vec!["Consider X".into()],
                warnings: Some(vec![]),
            })
        );
    }
}
