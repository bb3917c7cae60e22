//! Strategy Executor Orchestrator (C14).
//!
//! Binds intent/complexity classification, strategy selection and
//! execution, quality gates, metrics, and persistence into the
//! end-to-end `handle(request) -> response` flow of spec.md §4.14. The
//! eight numbered steps in [`Orchestrator::handle`]'s body correspond
//! directly to that contract.

use crate::api::{DegradationFlags, ImprovePromptRequest, ImprovePromptResponse};
use crate::circuit_breaker::CircuitBreaker;
use crate::complexity::ComplexityAnalyzer;
use crate::container::Container;
use crate::error::{Error, Result};
use crate::gates::{self, GateSummary, Template};
use crate::generator::PromptGenerator;
use crate::intent::IntentClassifier;
use crate::metrics::{self, ExecutionMetadata, ImpactSignals, QualityWeights};
use crate::persistence::{PromptRecord, SharedRepository};
use crate::pool::ExamplePool;
use crate::strategy::selector::{self, Mode};
use crate::strategy::{
    candidate_json, complex, few_shot, required_keys, zero_shot, StrategyDescriptor,
    StrategyOutcome,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const MIN_IDEA_LEN: usize = 5;

/// Process-wide configuration for a single [`Orchestrator`] instance.
/// Fields correspond to the subset of [`crate::config::Config`] the
/// orchestrator itself needs, kept separate so tests can construct a
/// minimal one without touching the environment.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub complex_strategy_enabled: bool,
    pub strategy_deadline: std::time::Duration,
    pub quality_weights: QualityWeights,
    pub provider_name: String,
    pub model_name: String,
}

/// Binds every pipeline stage and exposes the single `handle` entry
/// point. Cloning is cheap: every field is an `Arc` or small value.
#[derive(Clone)]
pub struct Orchestrator {
    generator: Arc<PromptGenerator>,
    pool: Arc<ExamplePool>,
    intent_classifier: Arc<IntentClassifier>,
    complexity_analyzer: ComplexityAnalyzer,
    repository: Option<SharedRepository>,
    circuit_breaker: Arc<CircuitBreaker>,
    settings: Arc<OrchestratorSettings>,
}

/// Evaluate gates over a final candidate when the strategy that produced
/// it did not already attach a summary (Zero-Shot and Few-Shot run no
/// validation of their own; Complex already validates every iteration).
fn gate_summary_for(outcome: &StrategyOutcome) -> GateSummary {
    match &outcome.gate_summary {
        Some(summary) => summary.clone(),
        None => {
            let template = Template::json(required_keys());
            gates::evaluate(&candidate_json(&outcome.prompt), &template)
        }
    }
}

impl Orchestrator {
    pub fn new(
        generator: PromptGenerator,
        pool: ExamplePool,
        intent_classifier: IntentClassifier,
        repository: Option<SharedRepository>,
        circuit_breaker: CircuitBreaker,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            generator: Arc::new(generator),
            pool: Arc::new(pool),
            intent_classifier: Arc::new(intent_classifier),
            complexity_analyzer: ComplexityAnalyzer::new(),
            repository,
            circuit_breaker: Arc::new(circuit_breaker),
            settings: Arc::new(settings),
        }
    }

    /// Step 1: validate the raw request against §3's invariants.
    fn validate(request: &ImprovePromptRequest) -> Result<Mode> {
        if request.idea.trim().chars().count() < MIN_IDEA_LEN {
            return Err(Error::invalid_input(format!(
                "idea must be at least {MIN_IDEA_LEN} characters after trimming"
            )));
        }
        Mode::parse(&request.mode)
            .ok_or_else(|| Error::invalid_input(format!("unknown mode '{}'", request.mode)))
    }

    async fn execute_once(
        &self,
        descriptor: StrategyDescriptor,
        request: &ImprovePromptRequest,
        intent: crate::intent::Intent,
        deadline: Instant,
    ) -> Result<StrategyOutcome> {
        let context = if request.context.trim().is_empty() { None } else { Some(request.context.as_str()) };

        match descriptor {
            StrategyDescriptor::Simple => zero_shot::run(&self.generator, &request.idea, context, intent).await,
            StrategyDescriptor::FewShot { k } => {
                few_shot::run(&self.generator, &self.pool, &request.idea, context, intent, k).await
            }
            StrategyDescriptor::Complex { max_iters, .. } => {
                complex::run(&self.generator, &self.pool, &request.idea, context, intent, max_iters, deadline).await
            }
        }
    }

    /// `handle(request) -> response`, per spec.md §4.14.
    pub async fn handle(&self, request: ImprovePromptRequest) -> Result<ImprovePromptResponse> {
        // 1. Validate.
        let mode = Self::validate(&request)?;

        // 2. Record start time.
        let start = Instant::now();
        let deadline = start + self.settings.strategy_deadline;

        // 3. Classify, analyze, select, note forced downgrades.
        let intent_result = self.intent_classifier.classify(&request.idea, Some(&request.context)).await;
        let complexity = self
            .complexity_analyzer
            .analyze(&request.idea, Some(&request.context));
        let initial_descriptor = selector::select(intent_result.intent, complexity, mode);
        let pool_available = !self.pool.is_empty();
        let (descriptor, forced_downgrade) =
            selector::downgrade_if_unavailable(initial_descriptor, pool_available, self.settings.complex_strategy_enabled);

        debug!(
            intent = %intent_result.intent,
            complexity = %complexity,
            strategy = descriptor.name(),
            forced_downgrade,
            "strategy selected"
        );

        // 4. Execute under the global deadline; one retry at a downgraded tier.
        let mut outcome = match self.execute_once(descriptor.clone(), &request, intent_result.intent, deadline).await {
            Ok(outcome) => outcome,
            Err(err) if err.is_provider_failure() => {
                warn!(error = %err, "strategy execution failed, retrying one tier down");
                let retry_descriptor = descriptor.downgrade();
                self.execute_once(retry_descriptor, &request, intent_result.intent, deadline).await?
            }
            Err(err) => return Err(err),
        };
        outcome.prompt.backend = Some(outcome.prompt.strategy.clone());

        // 5. Quality gates; attach summary, never reject the candidate on it.
        let gate_summary = gate_summary_for(&outcome);
        if !gate_summary.overall_pass {
            warn!(strategy = %outcome.prompt.strategy, "final candidate has failing gates; returning best available with flags");
        }

        // 6. Metrics.
        let latency_ms = start.elapsed().as_millis() as u64;
        let execution_metadata = ExecutionMetadata {
            latency_ms: Some(latency_ms),
            cost_usd: None,
        };
        let quality_metrics = metrics::compute(
            &outcome.prompt,
            Some(&gate_summary),
            execution_metadata,
            ImpactSignals::default(),
            None,
            self.settings.quality_weights,
        );

        let metrics_warning = if quality_metrics.metrics_failed {
            Some("one or more metrics dimensions could not be computed".to_string())
        } else if !gate_summary.overall_pass {
            Some("one or more quality gates did not pass; best candidate returned".to_string())
        } else {
            None
        };

        let degradation_flags = DegradationFlags {
            metrics_failed: quality_metrics.metrics_failed,
            knn_disabled: !pool_available,
            complex_strategy_disabled: !self.settings.complex_strategy_enabled,
            complex_strategy_exhausted: outcome.complex_strategy_exhausted,
        };

        // 7. Spawn (not await) background persistence through the circuit breaker.
        if let Some(repository) = self.repository.clone() {
            let record = PromptRecord {
                id: None,
                created_at: Utc::now(),
                original_idea: request.idea.clone(),
                context: request.context.clone(),
                improved_prompt: outcome.prompt.improved_prompt.clone(),
                role: outcome.prompt.role.clone(),
                directive: outcome.prompt.directive.clone(),
                framework: outcome.prompt.framework.clone(),
                guardrails: outcome.prompt.guardrails.clone(),
                reasoning: outcome.prompt.reasoning.clone(),
                confidence: outcome.prompt.confidence,
                backend: outcome.prompt.strategy.clone(),
                model: self.settings.model_name.clone(),
                provider: self.settings.provider_name.clone(),
                latency_ms: Some(latency_ms as i64),
            };
            let circuit_breaker = self.circuit_breaker.clone();
            tokio::spawn(async move {
                persist_with_circuit_breaker(repository, circuit_breaker, record).await;
            });
        }

        // 8. Response.
        Ok(ImprovePromptResponse {
            improved_prompt: outcome.prompt.improved_prompt,
            role: outcome.prompt.role,
            directive: outcome.prompt.directive,
            framework: outcome.prompt.framework,
            guardrails: outcome.prompt.guardrails,
            reasoning: outcome.prompt.reasoning,
            confidence: outcome.prompt.confidence,
            backend: outcome.prompt.backend,
            prompt_id: outcome.prompt.prompt_id.to_string(),
            strategy: outcome.prompt.strategy,
            intent: outcome.prompt.intent,
            metrics_warning,
            degradation_flags,
        })
    }
}

/// Background save path: `should_attempt()` first, save, then
/// `record_success()` called outside any error-handling branch so a
/// failure inside it cannot spuriously trigger `record_failure()`, per
/// spec.md §4.12's integration rule exactly.
async fn persist_with_circuit_breaker(repository: SharedRepository, circuit_breaker: Arc<CircuitBreaker>, record: PromptRecord) {
    if !circuit_breaker.should_attempt() {
        debug!("circuit breaker open, skipping persistence");
        return;
    }

    match repository.save(record).await {
        Ok(_) => {}
        Err(err) => {
            warn!(error = %err, "background persistence failed");
            circuit_breaker.record_failure();
            return;
        }
    }
    circuit_breaker.record_success();
}

/// Register the orchestrator's owned resources with a [`Container`] and
/// wire the repository's `close()` as a shutdown hook, per spec.md §5's
/// graceful-shutdown sequence ("invoke Container `shutdown()` which runs
/// cleanup hooks — most importantly closing the repository connection").
pub fn wire_container(container: &Container, orchestrator: Orchestrator) {
    let repository = orchestrator.repository.clone();
    container.register("orchestrator", orchestrator);
    if let Some(repository) = repository {
        container.register_shutdown_hook("repository", move || async move {
            if let Err(err) = repository.close().await {
                warn!(error = %err, "repository close failed during shutdown");
            } else {
                info!("repository connection closed");
            }
        });
    }
}
