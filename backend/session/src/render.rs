//! A presentation model of the insights panel, derived from a snapshot.
//!
//! Rendering is a pure function so every front end (the web page, the CLI
//! report) shows the same sections, fallbacks and error headings.

use serde::Serialize;

use taxwise_core::{InsightKind, InsightState};

use crate::session::SessionSnapshot;

const PLACEHOLDER_TITLE: &str = "AI Insights";
const PLACEHOLDER_DESCRIPTION: &str =
    "Upload a tax document to get AI-powered explanations, suggestions, and risk assessments.";
const PLACEHOLDER_BODY: &str = "Insights will appear here once a document is processed.";

/// Shown instead of tabs while no document is selected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placeholder {
    pub title: &'static str,
    pub description: &'static str,
    pub body: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SectionBody {
    Loading,
    Error { heading: String, message: String },
    Text { text: String },
    List { items: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionView {
    pub title: &'static str,
    pub body: SectionBody,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabView {
    pub kind: InsightKind,
    pub label: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub sections: Vec<SectionView>,
}

impl TabView {
    pub fn section(&self, title: &str) -> Option<&SectionView> {
        self.sections.iter().find(|s| s.title == title)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightsView {
    pub placeholder: Option<Placeholder>,
    pub tabs: Vec<TabView>,
}

impl InsightsView {
    pub fn tab(&self, kind: InsightKind) -> Option<&TabView> {
        self.tabs.iter().find(|t| t.kind == kind)
    }
}

fn section(title: &'static str, body: SectionBody) -> SectionView {
    SectionView { title, body }
}

fn error_body(title: &str, message: &str) -> SectionBody {
    SectionBody::Error {
        heading: format!("Error processing {title}"),
        message: message.to_string(),
    }
}

/// Main section body for one kind: loading, error, value, or a fallback.
fn primary<T>(
    title: &'static str,
    state: &InsightState<T>,
    present: impl FnOnce(&T) -> SectionBody,
    fallback: SectionBody,
) -> SectionView {
    let body = if state.is_loading() {
        SectionBody::Loading
    } else if let Some(message) = state.error() {
        error_body(title, message)
    } else {
        state.value().map(present).unwrap_or(fallback)
    };
    section(title, body)
}

fn non_empty_text(text: &str, fallback: &str) -> SectionBody {
    let text = if text.is_empty() { fallback } else { text };
    SectionBody::Text {
        text: text.to_string(),
    }
}

/// Build the insights panel for `snapshot`.
pub fn render_insights(snapshot: &SessionSnapshot) -> InsightsView {
    if snapshot.document.is_none() {
        return InsightsView {
            placeholder: Some(Placeholder {
                title: PLACEHOLDER_TITLE,
                description: PLACEHOLDER_DESCRIPTION,
                body: PLACEHOLDER_BODY,
            }),
            tabs: Vec::new(),
        };
    }

    const NO_EXPLANATION: &str = "No explanation available.";
    let simplification = TabView {
        kind: InsightKind::Simplification,
        label: InsightKind::Simplification.label(),
        title: "Tax Form Simplification",
        description: "Understand your tax form with plain language explanations.",
        sections: vec![primary(
            "Simplified Explanation",
            &snapshot.simplification,
            |out| non_empty_text(&out.simplified_explanation, NO_EXPLANATION),
            non_empty_text("", NO_EXPLANATION),
        )],
    };

    let mut deduction_sections = vec![primary(
        "Suggested Deductions",
        &snapshot.deductions,
        |out| SectionBody::List {
            items: out.suggestions.clone(),
        },
        SectionBody::List {
            items: vec!["No suggestions available.".to_string()],
        },
    )];
    if let Some(warnings) = snapshot
        .deductions
        .value()
        .and_then(|out| out.warnings.as_ref())
        .filter(|w| !w.is_empty())
    {
        deduction_sections.push(section(
            "Potential Warnings",
            SectionBody::List {
                items: warnings.clone(),
            },
        ));
    }
    let deductions = TabView {
        kind: InsightKind::Deductions,
        label: InsightKind::Deductions.label(),
        title: "Personalized Deduction Suggestions",
        description: "Discover potential deductions and credits based on your (mock) form data.",
        sections: deduction_sections,
    };

    const NO_RISK: &str = "No risk assessment available.";
    let mut risk_sections = vec![primary(
        "Risk Analysis",
        &snapshot.risk,
        |out| non_empty_text(&out.risk_assessment, NO_RISK),
        non_empty_text("", NO_RISK),
    )];
    if let Some(flags) = snapshot
        .risk
        .value()
        .and_then(|out| out.red_flags.as_ref())
        .filter(|f| !f.is_empty())
    {
        risk_sections.push(section(
            "Identified Red Flags",
            SectionBody::List {
                items: flags.clone(),
            },
        ));
    }
    let risk = TabView {
        kind: InsightKind::Risk,
        label: InsightKind::Risk.label(),
        title: "Risk Assessment",
        description: "Identify potential red flags or inconsistencies in your (mock) tax data.",
        sections: risk_sections,
    };

    InsightsView {
        placeholder: None,
        tabs: vec![simplification, deductions, risk],
    }
}
