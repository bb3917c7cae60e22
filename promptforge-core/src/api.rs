//! Transport-facing DTOs (spec.md §6). These mirror the JSON contract
//! verbatim; no HTTP framework is wired up here, since the transport
//! shell is explicitly out of scope.

use crate::intent::Intent;
use serde::{Deserialize, Serialize};

/// `POST /api/v1/improve-prompt` request body.
#[derive(Debug, Clone, Deserialize)]
pub struct ImprovePromptRequest {
    pub idea: String,
    #[serde(default)]
    pub context: String,
    pub mode: String,
}

/// Per-request degradation signals surfaced alongside a 200 response,
/// so a caller can tell the result is valid but reduced.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DegradationFlags {
    pub metrics_failed: bool,
    pub knn_disabled: bool,
    pub complex_strategy_disabled: bool,
    pub complex_strategy_exhausted: bool,
}

/// `POST /api/v1/improve-prompt` response body (200).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImprovePromptResponse {
    pub improved_prompt: String,
    pub role: String,
    pub directive: String,
    pub framework: String,
    pub guardrails: Vec<String>,
    pub reasoning: Option<String>,
    pub confidence: Option<f64>,
    pub backend: Option<String>,
    pub prompt_id: String,
    pub strategy: String,
    pub intent: Intent,
    pub metrics_warning: Option<String>,
    pub degradation_flags: DegradationFlags,
}

/// Error response body, shared by every non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

/// `GET /health` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub provider: String,
    pub model: String,
    pub dspy_configured: bool,
}

impl HealthResponse {
    pub fn healthy(provider: impl Into<String>, model: impl Into<String>, dspy_configured: bool) -> Self {
        Self {
            status: "healthy".to_string(),
            provider: provider.into(),
            model: model.into(),
            dspy_configured,
        }
    }
}
