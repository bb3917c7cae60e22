//! Zero-Shot Strategy (C6).
//!
//! One generator call with no demonstrations.

use super::StrategyOutcome;
use crate::error::Result;
use crate::generator::PromptGenerator;
use crate::intent::Intent;

pub async fn run(
    generator: &PromptGenerator,
    raw_idea: &str,
    context: Option<&str>,
    intent: Intent,
) -> Result<StrategyOutcome> {
    let prompt = generator
        .generate(raw_idea, context, &[], intent, "simple-zero-shot", None)
        .await?;
    Ok(StrategyOutcome::simple(prompt))
}
