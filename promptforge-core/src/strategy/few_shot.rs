//! Few-Shot Strategy (C7).
//!
//! Queries the Example Pool for `k` demos, then makes one generator call
//! with whatever the pool returned. A pool that returns fewer than `k`
//! demos (including zero, which degrades to zero-shot behavior) is not an
//! error — `example_pool_degraded` is set instead.

use super::StrategyOutcome;
use crate::error::Result;
use crate::generator::PromptGenerator;
use crate::intent::Intent;
use crate::pool::ExamplePool;

pub async fn run(
    generator: &PromptGenerator,
    pool: &ExamplePool,
    raw_idea: &str,
    context: Option<&str>,
    intent: Intent,
    k: usize,
) -> Result<StrategyOutcome> {
    let demos = pool.select(raw_idea, k);
    let degraded = demos.len() < k;

    let prompt = generator
        .generate(raw_idea, context, &demos, intent, "few-shot", None)
        .await?;

    Ok(StrategyOutcome {
        prompt,
        gate_summary: None,
        complex_strategy_exhausted: false,
        example_pool_degraded: degraded,
    })
}
