mod deductions;
mod risk;
mod simplification;

pub use deductions::{personalized_deduction_suggestions, DEDUCTION_PROMPT};
pub use risk::{assess_tax_form_risk, RISK_PROMPT};
pub use simplification::{tax_form_simplification, SIMPLIFICATION_PROMPT};
