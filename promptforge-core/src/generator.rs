//! Prompt Generator (C5).
//!
//! A thin, non-retrying wrapper around a single LLM call using the
//! [`ImprovePrompt`](crate::signature::ImprovePrompt) signature. Retries are
//! a strategy responsibility (§4.5); this module issues exactly one call
//! and applies the spec's lenient post-processing before returning a
//! [`GeneratedPrompt`].
//!
//! Post-processing deliberately bypasses `Signature::from_response`'s
//! strict validation: the derive-generated default rejects an unknown
//! `framework` outright, but the generator must instead rewrite it to the
//! default and log a warning. JSON is extracted and fixed up on the raw
//! `serde_json::Value` before the final typed deserialization.

use crate::error::{Error, Result};
use crate::intent::Intent;
use crate::llm::{ChatMessage, CompletionRequest, LLMClient};
use crate::pool::{ExampleRecord, DEFAULT_FRAMEWORK, FRAMEWORK_VALUES};
use crate::signature::improve_prompt::{ImprovePrompt, ImprovePromptInputs, ImprovePromptOutputs};
use crate::signature::{extract_json, Signature};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// The full Generated Prompt data model (§3), stamped with the strategy
/// and intent that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedPrompt {
    pub improved_prompt: String,
    pub role: String,
    pub directive: String,
    pub framework: String,
    pub guardrails: Vec<String>,
    pub reasoning: Option<String>,
    pub confidence: Option<f64>,
    pub backend: Option<String>,
    pub prompt_id: Uuid,
    pub strategy: String,
    pub intent: Intent,
}

/// Invokes the configured LLM adapter with the `ImprovePrompt` signature
/// and applies post-processing. Agnostic to the underlying provider;
/// model and temperature are injected by the caller from configuration.
pub struct PromptGenerator {
    llm: Arc<dyn LLMClient>,
    model: String,
    temperature: f64,
    max_tokens: Option<u32>,
}

impl PromptGenerator {
    pub fn new(llm: Arc<dyn LLMClient>, model: impl Into<String>, temperature: f64) -> Self {
        Self {
            llm,
            model: model.into(),
            temperature,
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Render demos into the textual block fed to the `demos` input field.
    fn render_demos(demos: &[&ExampleRecord]) -> Option<String> {
        if demos.is_empty() {
            return None;
        }
        let mut rendered = String::new();
        for (i, demo) in demos.iter().enumerate() {
            rendered.push_str(&format!(
                "### Demo {}\nIdea: {}\nImproved prompt: {}\nRole: {}\nDirective: {}\nFramework: {}\nGuardrails: {}\n\n",
                i + 1,
                demo.original_idea,
                demo.improved_prompt,
                demo.role,
                demo.directive,
                demo.framework,
                demo.guardrails.join("; "),
            ));
        }
        Some(rendered)
    }

    /// Run exactly one generator call. Does not retry; a failed LLM call or
    /// unrecoverable malformed output propagates to the caller.
    pub async fn generate(
        &self,
        raw_idea: &str,
        context: Option<&str>,
        demos: &[&ExampleRecord],
        intent: Intent,
        strategy: impl Into<String>,
        backend: Option<&str>,
    ) -> Result<GeneratedPrompt> {
        let inputs = ImprovePromptInputs {
            raw_idea: raw_idea.to_string(),
            context: context.map(|c| c.to_string()),
            demos: Self::render_demos(demos),
        };

        let prompt = ImprovePrompt::to_prompt(&inputs);
        let mut request = CompletionRequest::new()
            .with_model(&self.model)
            .with_message(ChatMessage::user(prompt))
            .with_temperature(self.temperature);
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        let response = self.llm.complete(request).await?;

        let outputs = Self::parse_and_fix(&response.content)?;

        Ok(GeneratedPrompt {
            improved_prompt: outputs.improved_prompt,
            role: outputs.role,
            directive: outputs.directive,
            framework: outputs.framework,
            guardrails: outputs.guardrails,
            reasoning: outputs.reasoning,
            confidence: outputs.confidence,
            backend: backend.map(str::to_string),
            prompt_id: Uuid::new_v4(),
            strategy: strategy.into(),
            intent,
        })
    }

    /// Extract JSON from a raw LLM response and apply the spec's lenient
    /// post-processing fixups before final typed deserialization.
    fn parse_and_fix(response: &str) -> Result<ImprovePromptOutputs> {
        let json_str = extract_json(response.trim());
        let mut value: Value = serde_json::from_str(json_str)
            .map_err(|e| Error::LLM(format!("generator response was not valid JSON: {e}")))?;

        let obj = value.as_object_mut().ok_or_else(|| {
            Error::LLM("generator response JSON was not an object".to_string())
        })?;

        for key in ["improved_prompt", "role", "directive", "framework", "reasoning"] {
            if let Some(Value::String(s)) = obj.get_mut(key) {
                *s = s.trim().to_string();
            }
        }

        fix_guardrails(obj)?;
        fix_framework(obj);
        fix_confidence(obj);

        serde_json::from_value(value)
            .map_err(|e| Error::LLM(format!("generator response did not match schema: {e}")))
    }
}

fn fix_guardrails(obj: &mut serde_json::Map<String, Value>) -> Result<()> {
    let coerced = match obj.get("guardrails") {
        Some(Value::String(s)) => s
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| Value::String(line.to_string()))
            .collect::<Vec<_>>(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Value::String(s.to_string()))
            .collect::<Vec<_>>(),
        _ => Vec::new(),
    };

    if coerced.is_empty() {
        return Err(Error::invalid_input(
            "generator produced an empty guardrails list",
        ));
    }

    obj.insert("guardrails".to_string(), Value::Array(coerced));
    Ok(())
}

fn fix_framework(obj: &mut serde_json::Map<String, Value>) {
    let current = obj.get("framework").and_then(|v| v.as_str()).unwrap_or("");
    if !FRAMEWORK_VALUES.contains(&current) {
        warn!("generator produced unknown framework {current:?}; rewriting to {DEFAULT_FRAMEWORK}");
        obj.insert(
            "framework".to_string(),
            Value::String(DEFAULT_FRAMEWORK.to_string()),
        );
    }
}

fn fix_confidence(obj: &mut serde_json::Map<String, Value>) {
    let Some(value) = obj.get("confidence") else {
        return;
    };
    match value.as_f64() {
        Some(c) if (0.0..=1.0).contains(&c) => {}
        Some(c) => {
            warn!("generator confidence {c} outside [0,1]; dropping to null");
            obj.insert("confidence".to_string(), Value::Null);
        }
        None if value.is_null() => {}
        None => {
            warn!("generator confidence was not numeric; dropping to null");
            obj.insert("confidence".to_string(), Value::Null);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error as CrateError;
    use crate::llm::{CompletionResponse, EmbeddingRequest, EmbeddingResponse, StopReason, TokenUsage};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    struct StubClient {
        response: Mutex<Option<String>>,
    }

    #[async_trait]
    impl LLMClient for StubClient {
        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse> {
            let content = self
                .response
                .lock()
                .unwrap()
                .take()
                .unwrap_or_default();
            Ok(CompletionResponse {
                id: "stub".to_string(),
                model: "stub-model".to_string(),
                content,
                stop_reason: Some(StopReason::EndTurn),
                usage: TokenUsage::default(),
                timestamp: Utc::now(),
                cost: None,
            })
        }

        async fn embed(&self, _request: EmbeddingRequest) -> Result<EmbeddingResponse> {
            Err(CrateError::internal("embeddings not supported by stub"))
        }

        fn provider(&self) -> crate::llm::Provider {
            crate::llm::Provider::Anthropic
        }

        fn available_models(&self) -> Vec<crate::llm::ModelSpec> {
            Vec::new()
        }
    }

    fn stub(content: &str) -> Arc<dyn LLMClient> {
        Arc::new(StubClient {
            response: Mutex::new(Some(content.to_string())),
        })
    }

    #[tokio::test]
    async fn test_generate_parses_valid_response() {
        let llm = stub(
            r#"{
                "improved_prompt": "You are a senior engineer. Fix the bug.",
                "role": "senior software engineer",
                "directive": "Fix the described bug",
                "framework": "chain-of-thought",
                "guardrails": ["Do not change unrelated files", "Add a regression test"],
                "confidence": 0.8
            }"#,
        );
        let generator = PromptGenerator::new(llm, "claude-3-5-sonnet-20241022", 0.0);
        let result = generator
            .generate("Fix the bug", None, &[], Intent::Debug, "zero-shot", Some("zero-shot"))
            .await
            .expect("should generate");
        assert_eq!(result.framework, "chain-of-thought");
        assert_eq!(result.guardrails.len(), 2);
        assert_eq!(result.confidence, Some(0.8));
    }

    #[tokio::test]
    async fn test_generate_rewrites_unknown_framework() {
        let llm = stub(
            r#"{
                "improved_prompt": "x",
                "role": "x",
                "directive": "x",
                "framework": "zero-shot",
                "guardrails": ["one constraint"]
            }"#,
        );
        let generator = PromptGenerator::new(llm, "model", 0.0);
        let result = generator
            .generate("idea", None, &[], Intent::Generate, "zero-shot", None)
            .await
            .expect("should generate despite unknown framework");
        assert_eq!(result.framework, DEFAULT_FRAMEWORK);
    }

    #[tokio::test]
    async fn test_generate_coerces_guardrails_string_to_list() {
        let llm = stub(
            r#"{
                "improved_prompt": "x",
                "role": "x",
                "directive": "x",
                "framework": "chain-of-thought",
                "guardrails": "Do one thing\nDo another thing"
            }"#,
        );
        let generator = PromptGenerator::new(llm, "model", 0.0);
        let result = generator
            .generate("idea", None, &[], Intent::Generate, "zero-shot", None)
            .await
            .expect("should generate");
        assert_eq!(result.guardrails, vec!["Do one thing", "Do another thing"]);
    }

    #[tokio::test]
    async fn test_generate_rejects_empty_guardrails() {
        let llm = stub(
            r#"{
                "improved_prompt": "x",
                "role": "x",
                "directive": "x",
                "framework": "chain-of-thought",
                "guardrails": []
            }"#,
        );
        let generator = PromptGenerator::new(llm, "model", 0.0);
        let result = generator
            .generate("idea", None, &[], Intent::Generate, "zero-shot", None)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_generate_clamps_out_of_range_confidence_to_null() {
        let llm = stub(
            r#"{
                "improved_prompt": "x",
                "role": "x",
                "directive": "x",
                "framework": "chain-of-thought",
                "guardrails": ["one"],
                "confidence": 1.5
            }"#,
        );
        let generator = PromptGenerator::new(llm, "model", 0.0);
        let result = generator
            .generate("idea", None, &[], Intent::Generate, "zero-shot", None)
            .await
            .expect("should generate");
        assert_eq!(result.confidence, None);
    }
}
