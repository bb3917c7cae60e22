//! # promptforge-core
//!
//! A hybrid prompt-improvement pipeline: takes a raw user idea and a
//! requested mode, classifies its intent and complexity, routes it to a
//! zero-shot, few-shot, or iterative "complex" generation strategy, checks
//! the result against a quality-gate catalog, computes quality/impact
//! metrics, and (best-effort, circuit-breaker guarded) persists the result.
//!
//! ## Core Components
//!
//! - **Intent & Complexity**: classify the raw idea (`intent`, `complexity`)
//! - **Example Pool**: KNN retrieval over curated few-shot demonstrations (`pool`)
//! - **Strategy**: zero-shot / few-shot / complex generation (`strategy`)
//! - **Gates**: structural and content quality checks (`gates`)
//! - **Metrics**: quality, performance, and impact scoring (`metrics`)
//! - **Persistence**: SQLite-backed prompt history behind a circuit breaker
//!   (`persistence`, `circuit_breaker`)
//! - **Orchestrator**: binds every component into a single request/response
//!   contract (`orchestrator`)
//!
//! ## Example
//!
//! ```rust,ignore
//! use promptforge_core::api::ImprovePromptRequest;
//! use promptforge_core::config::Config;
//!
//! let config = Config::from_env();
//! let request = ImprovePromptRequest {
//!     idea: "build a rate limiter".to_string(),
//!     context: String::new(),
//!     mode: "legacy".to_string(),
//! };
//! ```

// Self-alias for derive macro support within the crate
extern crate self as promptforge_core;

pub mod api;
pub mod circuit_breaker;
pub mod complexity;
pub mod config;
pub mod container;
pub mod error;
pub mod gates;
pub mod generator;
pub mod intent;
pub mod llm;
pub mod metrics;
pub mod orchestrator;
pub mod persistence;
pub mod pool;
pub mod signature;
pub mod strategy;

// Re-exports for convenience
pub use api::{
    DegradationFlags, ErrorResponse, HealthResponse, ImprovePromptRequest, ImprovePromptResponse,
};
pub use circuit_breaker::CircuitBreaker;
pub use complexity::{ComplexityAnalyzer, ComplexityLevel};
pub use config::Config;
pub use container::Container;
pub use error::{Error, Result};
pub use gates::{GateResult, GateSummary, Severity, Template, TemplateKind};
pub use generator::{GeneratedPrompt, PromptGenerator};
pub use intent::{Intent, IntentClassifier, IntentResult};
pub use llm::{
    AnthropicClient, ClientConfig, CompletionRequest, CompletionResponse, CostTracker, LLMClient,
    MultiProviderClient, ModelSpec, ModelTier, OpenAIClient, Provider, TrackedClient,
};
pub use metrics::{ExecutionMetadata, ImpactSignals, QualityMetrics, QualityWeights};
pub use orchestrator::{wire_container, Orchestrator, OrchestratorSettings};
pub use persistence::{
    PromptRecord, RecordFilters, Repository, SharedRepository, SqliteRepository, Statistics,
};
pub use pool::{ExamplePool, ExampleRecord};
pub use signature::{
    apply_defaults, validate_fields, validate_value, FieldSpec, FieldType, ImprovePrompt,
    ImprovePromptInputs, ImprovePromptOutputs, ParseError, Signature, ValidationError,
    ValidationResult,
};
pub use strategy::{StrategyDescriptor, StrategyOutcome};
