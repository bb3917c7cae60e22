//! Error types for promptforge-core.

use thiserror::Error;

/// Result type alias using promptforge-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during pipeline operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Request failed an input invariant (idea too short, invalid mode,
    /// empty guardrails that could not be rewritten). Surfaces as 400 at
    /// the transport boundary.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The LLM adapter could not be reached or returned a retryable
    /// failure (timeout, network error, quota). Triggers strategy
    /// downgrade; surfaces as 503 if all strategies are exhausted.
    #[error("provider unavailable: {provider} - {message}")]
    ProviderUnavailable { provider: String, message: String },

    /// A per-request or per-call deadline elapsed. Strategies attempt to
    /// return a best-so-far candidate; surfaces as 504 if none exists.
    #[error("deadline exceeded after {duration_ms}ms")]
    DeadlineExceeded { duration_ms: u64 },

    /// A repository operation failed (connection, disk, constraint
    /// violation). Handled entirely within the background save path and
    /// never reaches a request's response; feeds circuit breaker
    /// failure accounting.
    #[error("storage error: {0}")]
    Storage(String),

    /// The circuit breaker is open; the caller should skip the guarded
    /// operation rather than attempt it.
    #[error("circuit breaker open until {disabled_until}")]
    CircuitOpen { disabled_until: String },

    /// The dependency container was asked for a service that was never
    /// registered. Indicates a programmer error; allowed to propagate
    /// as 500.
    #[error("unknown service requested from container: {0}")]
    UnknownService(String),

    /// Low-level LLM adapter error (HTTP, parsing, provider response
    /// shape). Strategies treat this the same as `ProviderUnavailable`.
    #[error("LLM error: {0}")]
    LLM(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error (malformed environment value, bad path).
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error that does not fit another category.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an invalid-input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a provider-unavailable error.
    pub fn provider_unavailable(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a deadline-exceeded error.
    pub fn deadline_exceeded(duration_ms: u64) -> Self {
        Self::DeadlineExceeded { duration_ms }
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Create a circuit-open error.
    pub fn circuit_open(disabled_until: impl Into<String>) -> Self {
        Self::CircuitOpen {
            disabled_until: disabled_until.into(),
        }
    }

    /// Create an unknown-service error.
    pub fn unknown_service(name: impl Into<String>) -> Self {
        Self::UnknownService(name.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether this error represents a provider-level failure that a
    /// strategy should treat as grounds for downgrading one tier.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable { .. } | Self::DeadlineExceeded { .. } | Self::LLM(_)
        )
    }
}
