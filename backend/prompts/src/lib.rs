//! Prompt clients for the three TaxWise insights and the gateway that turns
//! their failures into tagged results.
//!
//! Each client validates its input, renders a fixed template, asks the
//! completion service for output constrained to a declared shape, and parses
//! the reply into a typed value.

pub mod actions;
pub mod definition;
pub mod flows;
pub mod template;

pub use actions::{ActionResult, InsightActions, PromptActions};
pub use definition::{run_prompt, PromptDefinition, ValidateInput};
pub use flows::{assess_tax_form_risk, personalized_deduction_suggestions, tax_form_simplification};
pub use template::{PromptTemplate, RenderedPrompt};
