//! LLM client abstraction.
//!
//! This module provides a unified interface for working with multiple LLM
//! providers (Anthropic, OpenAI). The Prompt Generator (see `generator`) is
//! agnostic to which concrete provider is wired in; provider, model, and
//! temperature are injected from `config::Config`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use promptforge_core::llm::{AnthropicClient, ClientConfig, CompletionRequest, ChatMessage};
//!
//! let client = AnthropicClient::new(
//!     ClientConfig::new("your-api-key")
//!         .with_default_model("claude-3-5-sonnet-20241022")
//! );
//!
//! let request = CompletionRequest::new()
//!     .with_model("claude-3-5-sonnet-20241022")
//!     .with_message(ChatMessage::user("Hello"));
//!
//! let response = client.complete(request).await?;
//! ```

mod client;
mod types;

pub use client::{
    AnthropicClient, ClientConfig, LLMClient, MultiProviderClient, OpenAIClient, TrackedClient,
};
#[cfg(feature = "gemini")]
pub use client::GoogleClient;
pub use types::{
    CacheControl, ChatMessage, ChatRole, CompletionRequest, CompletionResponse, CostTracker,
    EmbeddingRequest, EmbeddingResponse, ModelCosts, ModelSpec, ModelTier, Provider, StopReason,
    TierBreakdown, TierCosts, TokenUsage,
};
