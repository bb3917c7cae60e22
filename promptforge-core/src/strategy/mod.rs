//! Strategy routing & execution (C3, C6, C7, C8).
//!
//! A [`StrategyDescriptor`] names which generation strategy a request is
//! routed to; [`selector::select`] computes it deterministically from
//! intent, complexity and mode. The three executor modules share the
//! [`StrategyOutcome`] return shape so the orchestrator can treat them
//! uniformly.

pub mod complex;
pub mod few_shot;
pub mod selector;
pub mod zero_shot;

use crate::gates::GateSummary;
use crate::generator::GeneratedPrompt;
use serde::{Deserialize, Serialize};

/// Field names every Generated Prompt must carry, per §3 — the required
/// keys for the `json` gate template used to validate a candidate's full
/// JSON representation. Shared by the Complex Strategy (per-iteration
/// validation) and the Orchestrator (final-candidate validation for
/// strategies that don't already validate their own output).
pub(crate) fn required_keys() -> Vec<String> {
    vec![
        "improved_prompt".to_string(),
        "role".to_string(),
        "directive".to_string(),
        "framework".to_string(),
        "guardrails".to_string(),
    ]
}

/// Render a Generated Prompt back to the JSON shape the generator's LLM
/// call originally produced, for gate evaluation.
pub(crate) fn candidate_json(prompt: &GeneratedPrompt) -> String {
    serde_json::json!({
        "improved_prompt": prompt.improved_prompt,
        "role": prompt.role,
        "directive": prompt.directive,
        "framework": prompt.framework,
        "guardrails": prompt.guardrails,
        "reasoning": prompt.reasoning,
        "confidence": prompt.confidence,
    })
    .to_string()
}

/// Which generation strategy a request was routed to, and its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StrategyDescriptor {
    Simple,
    FewShot { k: usize },
    Complex {
        max_iters: u32,
        validator_on: bool,
        reflexion_on: bool,
    },
}

impl StrategyDescriptor {
    /// Name used in response payloads and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Simple => "simple-zero-shot",
            Self::FewShot { .. } => "few-shot",
            Self::Complex { .. } => "complex",
        }
    }

    /// Deterministic one-tier downgrade: Complex -> FewShot -> Simple.
    /// Simple has no further downgrade and returns itself.
    pub fn downgrade(&self) -> Self {
        match self {
            Self::Complex { .. } => Self::FewShot { k: 5 },
            Self::FewShot { .. } => Self::Simple,
            Self::Simple => Self::Simple,
        }
    }
}

/// Result of running a strategy to completion (or to deadline/exhaustion).
#[derive(Debug, Clone)]
pub struct StrategyOutcome {
    pub prompt: GeneratedPrompt,
    pub gate_summary: Option<GateSummary>,
    /// Set when the Complex strategy exhausted `max_iters` without a
    /// passing candidate and returned the best-scoring one instead.
    pub complex_strategy_exhausted: bool,
    /// Set when the Example Pool returned fewer than `k` demos.
    pub example_pool_degraded: bool,
}

impl StrategyOutcome {
    pub(crate) fn simple(prompt: GeneratedPrompt) -> Self {
        Self {
            prompt,
            gate_summary: None,
            complex_strategy_exhausted: false,
            example_pool_degraded: false,
        }
    }
}
