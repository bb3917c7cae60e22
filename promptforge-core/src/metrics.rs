//! Metrics Calculator (C10).
//!
//! Derives a four-dimensional metrics record (quality, performance, impact,
//! improvement delta) from a Generated Prompt, its execution metadata, and
//! optional impact signals. Per spec.md §4.10 weights are configurable but
//! documented: see [`QualityWeights::default`].

use crate::gates::GateSummary;
use crate::generator::GeneratedPrompt;
use serde::{Deserialize, Serialize};

/// Weights for the four quality sub-scores. Must sum to 1.0; the default
/// is equal weighting per spec.md §9's open-question guidance ("the
/// source suggests equal-or-near-equal weighting with small structural
/// bonuses").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityWeights {
    pub gate_pass_rate: f64,
    pub confidence: f64,
    pub completeness: f64,
    pub clarity: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            gate_pass_rate: 0.25,
            confidence: 0.25,
            completeness: 0.25,
            clarity: 0.25,
        }
    }
}

/// Execution metadata fed into the performance dimension.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    pub latency_ms: Option<u64>,
    pub cost_usd: Option<f64>,
}

/// User-reported or derived signals feeding the impact dimension.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ImpactSignals {
    pub copy_count: u32,
    pub feedback_rating: Option<f64>,
    pub reuse_count: u32,
    pub regeneration_count: u32,
}

/// A prior composite quality score used to compute the improvement delta.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Baseline {
    pub composite_quality: f64,
}

/// Per-dimension degradation accounting; any failed dimension is set to
/// `None` and `metrics_failed` is raised for the caller to flag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub quality: Option<f64>,
    pub performance: Option<f64>,
    pub impact: Option<f64>,
    pub improvement_delta: Option<f64>,
    pub metrics_failed: bool,
}

fn latency_band_score(latency_ms: u64) -> f64 {
    let seconds = latency_ms as f64 / 1000.0;
    if seconds <= 5.0 {
        1.0
    } else if seconds <= 10.0 {
        0.8
    } else if seconds <= 20.0 {
        0.5
    } else {
        0.2
    }
}

fn cost_band_score(cost_usd: f64) -> f64 {
    if cost_usd <= 0.01 {
        1.0
    } else if cost_usd <= 0.05 {
        0.8
    } else if cost_usd <= 0.20 {
        0.5
    } else {
        0.2
    }
}

fn guardrails_bonus(guardrails: &[String]) -> f64 {
    let substantive = guardrails.iter().filter(|g| g.trim().len() >= 8).count();
    let fraction = (substantive as f64 / 3.0).min(1.0);
    fraction * 0.15
}

fn structure_bonus(prompt: &GeneratedPrompt) -> f64 {
    let has_role = !prompt.role.trim().is_empty();
    let has_directive = !prompt.directive.trim().is_empty();
    if has_role && has_directive {
        0.10
    } else {
        0.0
    }
}

fn completeness_subscore(prompt: &GeneratedPrompt, gate_summary: Option<&GateSummary>) -> f64 {
    match gate_summary {
        Some(summary) => summary.composite_score(),
        None => {
            if prompt.improved_prompt.trim().is_empty() {
                0.0
            } else {
                1.0
            }
        }
    }
}

fn clarity_subscore(prompt: &GeneratedPrompt) -> f64 {
    let word_count = prompt
        .improved_prompt
        .split_whitespace()
        .filter(|w| !w.is_empty())
        .count();
    // Favor prompts with enough substance to be actionable without
    // rambling; band-scored rather than a raw linear function.
    if word_count < 10 {
        0.3
    } else if word_count <= 200 {
        1.0
    } else if word_count <= 400 {
        0.7
    } else {
        0.5
    }
}

/// Compute the quality composite for a Generated Prompt.
pub fn compute_quality(
    prompt: &GeneratedPrompt,
    gate_summary: Option<&GateSummary>,
    weights: QualityWeights,
) -> Option<f64> {
    let gate_pass_rate = gate_summary.map(|s| s.composite_score()).unwrap_or(1.0);
    let confidence = prompt.confidence.unwrap_or(0.5);
    let completeness = completeness_subscore(prompt, gate_summary);
    let clarity = clarity_subscore(prompt);

    let base = weights.gate_pass_rate * gate_pass_rate
        + weights.confidence * confidence
        + weights.completeness * completeness
        + weights.clarity * clarity;

    let score = base + guardrails_bonus(&prompt.guardrails) + structure_bonus(prompt);
    Some(score.clamp(0.0, 1.0))
}

/// Compute the performance score from execution metadata. Returns `None`
/// when neither latency nor cost is available (nothing to score).
pub fn compute_performance(metadata: ExecutionMetadata) -> Option<f64> {
    match (metadata.latency_ms, metadata.cost_usd) {
        (None, None) => None,
        (latency, cost) => {
            let latency_score = latency.map(latency_band_score).unwrap_or(1.0);
            let cost_score = cost.map(cost_band_score).unwrap_or(1.0);
            Some((latency_score * cost_score).clamp(0.0, 1.0))
        }
    }
}

/// Compute the impact score from user-derived signals.
pub fn compute_impact(signals: ImpactSignals) -> Option<f64> {
    let copy_norm = (signals.copy_count as f64 / 5.0).min(1.0);
    let feedback_norm = signals.feedback_rating.map(|r| (r / 5.0).clamp(0.0, 1.0));
    let reuse_norm = (signals.reuse_count as f64 / 5.0).min(1.0);
    let regen_penalty = 1.0 / (1.0 + signals.regeneration_count as f64);

    let (feedback_weight, feedback_value) = match feedback_norm {
        Some(v) => (0.4, v),
        None => (0.0, 0.0),
    };
    let remaining_weight = 1.0 - feedback_weight;
    let other_weight = remaining_weight / 3.0;

    let score = feedback_weight * feedback_value
        + other_weight * copy_norm
        + other_weight * reuse_norm
        + other_weight * regen_penalty;

    Some(score.clamp(0.0, 1.0))
}

/// Compute the improvement delta against a rolling-window baseline.
/// `None` when no baseline is available, per spec.md §4.10.
pub fn compute_improvement_delta(current_quality: Option<f64>, baseline: Option<Baseline>) -> Option<f64> {
    match (current_quality, baseline) {
        (Some(current), Some(baseline)) => Some(current - baseline.composite_quality),
        _ => None,
    }
}

/// Assemble the full metrics record. Never panics: any sub-computation
/// that cannot be performed degrades its dimension to `None` and raises
/// `metrics_failed`.
pub fn compute(
    prompt: &GeneratedPrompt,
    gate_summary: Option<&GateSummary>,
    metadata: ExecutionMetadata,
    impact: ImpactSignals,
    baseline: Option<Baseline>,
    weights: QualityWeights,
) -> QualityMetrics {
    let quality = compute_quality(prompt, gate_summary, weights);
    let performance = compute_performance(metadata);
    let impact_score = compute_impact(impact);
    let improvement_delta = compute_improvement_delta(quality, baseline);

    let metrics_failed = quality.is_none() || performance.is_none();

    QualityMetrics {
        quality,
        performance,
        impact: impact_score,
        improvement_delta,
        metrics_failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::Intent;
    use uuid::Uuid;

    fn sample_prompt() -> GeneratedPrompt {
        GeneratedPrompt {
            improved_prompt: "You are a senior engineer. Diagnose the race condition in the upload handler and propose a fix with a regression test.".to_string(),
            role: "senior engineer".to_string(),
            directive: "Diagnose and fix the race condition".to_string(),
            framework: "decomposition".to_string(),
            guardrails: vec!["Do not touch unrelated files".to_string(), "Add a regression test".to_string()],
            reasoning: None,
            confidence: Some(0.8),
            backend: None,
            prompt_id: Uuid::new_v4(),
            strategy: "few-shot".to_string(),
            intent: Intent::Debug,
        }
    }

    #[test]
    fn test_quality_clamped_to_unit_interval() {
        let prompt = sample_prompt();
        let score = compute_quality(&prompt, None, QualityWeights::default()).unwrap();
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn test_performance_none_when_no_metadata() {
        assert_eq!(compute_performance(ExecutionMetadata::default()), None);
    }

    #[test]
    fn test_performance_band_scores() {
        let fast_cheap = compute_performance(ExecutionMetadata {
            latency_ms: Some(2_000),
            cost_usd: Some(0.005),
        })
        .unwrap();
        assert_eq!(fast_cheap, 1.0);

        let slow_expensive = compute_performance(ExecutionMetadata {
            latency_ms: Some(25_000),
            cost_usd: Some(0.5),
        })
        .unwrap();
        assert_eq!(slow_expensive, 0.2 * 0.2);
    }

    #[test]
    fn test_impact_with_no_signals_is_low_but_defined() {
        let score = compute_impact(ImpactSignals::default()).unwrap();
        assert!(score >= 0.0 && score < 0.5);
    }

    #[test]
    fn test_improvement_delta_none_without_baseline() {
        assert_eq!(compute_improvement_delta(Some(0.8), None), None);
    }

    #[test]
    fn test_improvement_delta_computed_against_baseline() {
        let delta = compute_improvement_delta(
            Some(0.8),
            Some(Baseline {
                composite_quality: 0.6,
            }),
        );
        assert!((delta.unwrap() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_compute_sets_metrics_failed_when_performance_unavailable() {
        let prompt = sample_prompt();
        let result = compute(
            &prompt,
            None,
            ExecutionMetadata::default(),
            ImpactSignals::default(),
            None,
            QualityWeights::default(),
        );
        assert!(result.metrics_failed);
        assert!(result.quality.is_some());
        assert!(result.performance.is_none());
    }

    #[test]
    fn test_compute_full_record_not_failed_with_metadata() {
        let prompt = sample_prompt();
        let result = compute(
            &prompt,
            None,
            ExecutionMetadata {
                latency_ms: Some(3_000),
                cost_usd: Some(0.01),
            },
            ImpactSignals::default(),
            None,
            QualityWeights::default(),
        );
        assert!(!result.metrics_failed);
    }

    proptest::proptest! {
        #[test]
        fn quality_composite_always_clamped(
            confidence in 0.0f64..=1.0,
            word_count in 0usize..600,
            guardrail_count in 0usize..6,
        ) {
            let mut prompt = sample_prompt();
            prompt.confidence = Some(confidence);
            prompt.improved_prompt = vec!["word"; word_count].join(" ");
            prompt.guardrails = (0..guardrail_count)
                .map(|i| format!("guardrail number {i} with enough length"))
                .collect();

            let score = compute_quality(&prompt, None, QualityWeights::default()).unwrap();
            proptest::prop_assert!((0.0..=1.0).contains(&score));
        }

        #[test]
        fn impact_score_always_clamped(
            copy_count in 0u32..1000,
            reuse_count in 0u32..1000,
            regeneration_count in 0u32..1000,
            feedback_rating in proptest::option::of(0.0f64..10.0),
        ) {
            let signals = ImpactSignals {
                copy_count,
                feedback_rating,
                reuse_count,
                regeneration_count,
            };
            let score = compute_impact(signals).unwrap();
            proptest::prop_assert!((0.0..=1.0).contains(&score));
        }
    }
}
