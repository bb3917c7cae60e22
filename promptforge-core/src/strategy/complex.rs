//! Complex Strategy: OPRO + Validator + Reflexion (C8).
//!
//! An iterative refinement loop seeded by one Few-Shot call. Each
//! candidate is validated with the Quality Gates; on failure, either a
//! Reflexion-style call (DEBUG intent) or an OPRO-style call (other
//! intents) requests a revision that addresses the gate failures. Runs
//! under a hard deadline and falls back to the best-scoring candidate
//! seen if no candidate ever passes.
//!
//! Gates are evaluated against the candidate's full JSON representation
//! (the same shape the generator's LLM call returns), using the `json`
//! template with the Generated Prompt's required fields as required keys.
//! This keeps validation grounded in the actual generator contract rather
//! than inventing a template-selection policy the spec leaves open.

use super::{candidate_json, required_keys, StrategyOutcome};
use crate::error::Result;
use crate::gates::{self, GateSummary, Template};
use crate::generator::{GeneratedPrompt, PromptGenerator};
use crate::intent::Intent;
use crate::pool::ExamplePool;
use std::time::Instant;
use tracing::warn;

fn validate(prompt: &GeneratedPrompt) -> GateSummary {
    let template = Template::json(required_keys());
    gates::evaluate(&candidate_json(prompt), &template)
}

fn failure_summary(summary: &GateSummary) -> String {
    let failures: Vec<String> = summary
        .results
        .iter()
        .filter(|r| !r.pass)
        .map(|r| format!("{} (severity={:?}): {}", r.gate_id, r.severity, r.evidence))
        .collect();
    if failures.is_empty() {
        "no gate failures".to_string()
    } else {
        failures.join("; ")
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn run(
    generator: &PromptGenerator,
    pool: &ExamplePool,
    raw_idea: &str,
    context: Option<&str>,
    intent: Intent,
    max_iters: u32,
    deadline: Instant,
) -> Result<StrategyOutcome> {
    let seed_demos = pool.select(raw_idea, 5);
    let pool_degraded = seed_demos.len() < 5;

    let mut candidate = generator
        .generate(raw_idea, context, &seed_demos, intent, "complex", None)
        .await?;
    let mut summary = validate(&candidate);

    if summary.overall_pass {
        return Ok(StrategyOutcome {
            prompt: candidate,
            gate_summary: Some(summary),
            complex_strategy_exhausted: false,
            example_pool_degraded: pool_degraded,
        });
    }

    let mut best = candidate.clone();
    let mut best_score = summary.composite_score();

    for iteration in 1..max_iters {
        if Instant::now() >= deadline {
            warn!("complex strategy deadline reached at iteration {iteration}; returning best candidate so far");
            return Ok(StrategyOutcome {
                prompt: best,
                gate_summary: Some(summary),
                complex_strategy_exhausted: true,
                example_pool_degraded: pool_degraded,
            });
        }

        let branch_context = format!(
            "{}\n\n[Revision request — iteration {iteration}]\nPrevious candidate:\n{}\n\nGate failures to address:\n{}",
            context.unwrap_or_default(),
            candidate.improved_prompt,
            failure_summary(&summary),
        );

        let label = if intent == Intent::Debug {
            "complex-reflexion"
        } else {
            "complex-opro"
        };

        let revised = generator
            .generate(raw_idea, Some(&branch_context), &seed_demos, intent, label, None)
            .await;

        candidate = match revised {
            Ok(c) => c,
            Err(e) if e.is_provider_failure() => {
                warn!("complex strategy iteration {iteration} failed: {e}; returning best candidate so far");
                return Ok(StrategyOutcome {
                    prompt: best,
                    gate_summary: Some(summary),
                    complex_strategy_exhausted: true,
                    example_pool_degraded: pool_degraded,
                });
            }
            Err(e) => return Err(e),
        };

        summary = validate(&candidate);
        let score = summary.composite_score();
        if score > best_score {
            best = candidate.clone();
            best_score = score;
        }

        if summary.overall_pass {
            return Ok(StrategyOutcome {
                prompt: candidate,
                gate_summary: Some(summary),
                complex_strategy_exhausted: false,
                example_pool_degraded: pool_degraded,
            });
        }
    }

    Ok(StrategyOutcome {
        prompt: best,
        gate_summary: Some(summary),
        complex_strategy_exhausted: true,
        example_pool_degraded: pool_degraded,
    })
}
