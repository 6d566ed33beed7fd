//! Per-kind insight state, tagged with the document generation it belongs to.

use serde::Serialize;

use taxwise_core::{
    DeductionSuggestions, InsightKind, InsightState, RiskAssessment, SimplificationOutput,
};
use taxwise_prompts::ActionResult;

/// A resolved gateway call for one insight kind.
#[derive(Debug, Clone)]
pub enum InsightOutcome {
    Simplification(ActionResult<SimplificationOutput>),
    Deductions(ActionResult<DeductionSuggestions>),
    Risk(ActionResult<RiskAssessment>),
}

impl InsightOutcome {
    pub fn kind(&self) -> InsightKind {
        match self {
            Self::Simplification(_) => InsightKind::Simplification,
            Self::Deductions(_) => InsightKind::Deductions,
            Self::Risk(_) => InsightKind::Risk,
        }
    }

    /// The error message, if the call failed.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Simplification(ActionResult::Error { error })
            | Self::Deductions(ActionResult::Error { error })
            | Self::Risk(ActionResult::Error { error }) => Some(error),
            _ => None,
        }
    }
}

/// What happened to an outcome handed to [`InsightBoard::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// The outcome belonged to an earlier document and was dropped.
    Stale,
}

/// The three insight states plus the generation they describe.
///
/// Each kind's slot is written only by the outcome for that kind, and only
/// while the outcome's generation is still current.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InsightBoard {
    generation: u64,
    pub simplification: InsightState<SimplificationOutput>,
    pub deductions: InsightState<DeductionSuggestions>,
    pub risk: InsightState<RiskAssessment>,
}

impl InsightBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Start a new generation with every kind back to Idle.
    pub fn reset(&mut self) -> u64 {
        self.generation += 1;
        self.simplification = InsightState::Idle;
        self.deductions = InsightState::Idle;
        self.risk = InsightState::Idle;
        self.generation
    }

    /// Mark every kind as Loading for the current generation.
    pub fn begin_loading(&mut self) -> u64 {
        self.simplification = InsightState::Loading;
        self.deductions = InsightState::Loading;
        self.risk = InsightState::Loading;
        self.generation
    }

    /// True while any kind of the current generation is still in flight.
    pub fn is_processing(&self) -> bool {
        self.simplification.is_loading() || self.deductions.is_loading() || self.risk.is_loading()
    }

    pub fn is_loading(&self, kind: InsightKind) -> bool {
        match kind {
            InsightKind::Simplification => self.simplification.is_loading(),
            InsightKind::Deductions => self.deductions.is_loading(),
            InsightKind::Risk => self.risk.is_loading(),
        }
    }

    /// Record an outcome if it is for the current generation and its kind is loading.
    pub fn apply(&mut self, generation: u64, outcome: InsightOutcome) -> ApplyOutcome {
        if generation != self.generation || !self.is_loading(outcome.kind()) {
            return ApplyOutcome::Stale;
        }
        match outcome {
            InsightOutcome::Simplification(result) => self.simplification = settle(result),
            InsightOutcome::Deductions(result) => self.deductions = settle(result),
            InsightOutcome::Risk(result) => self.risk = settle(result),
        }
        ApplyOutcome::Applied
    }
}

fn settle<T>(result: ActionResult<T>) -> InsightState<T> {
    match result {
        ActionResult::Success(value) => InsightState::Succeeded { value },
        ActionResult::Error { error } => InsightState::Failed { message: error },
    }
}
