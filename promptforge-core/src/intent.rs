//! Intent Classifier (C1).
//!
//! A rule-first, LLM-fallback cascade that assigns one of four intent
//! labels to a raw idea. The rule pass mirrors the keyword/regex scoring
//! idiom used by the complexity classifier; the LLM fallback only fires
//! when the rule pass is ambiguous, and failures collapse to a safe
//! default rather than propagating to the caller.

use crate::llm::{ChatMessage, CompletionRequest, LLMClient};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use tracing::warn;

/// One of four categorical labels describing what the user wants to
/// accomplish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Intent {
    Debug,
    Refactor,
    Generate,
    Explain,
}

impl Intent {
    /// Parse a label as returned by the LLM fallback, tolerating the
    /// `ANALYZE` alias for `EXPLAIN`.
    fn parse_label(label: &str) -> Option<Self> {
        match label.trim().to_uppercase().as_str() {
            "DEBUG" => Some(Self::Debug),
            "REFACTOR" => Some(Self::Refactor),
            "GENERATE" => Some(Self::Generate),
            "EXPLAIN" | "ANALYZE" => Some(Self::Explain),
            _ => None,
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Debug => "DEBUG",
            Self::Refactor => "REFACTOR",
            Self::Generate => "GENERATE",
            Self::Explain => "EXPLAIN",
        };
        write!(f, "{s}")
    }
}

/// An intent label plus the classifier's confidence in it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    pub intent: Intent,
    pub confidence: f64,
}

/// Confidence reserved for the LLM fallback's ceiling (never as confident
/// as a clean rule-pass win).
const LLM_FALLBACK_CONFIDENCE_CAP: f64 = 0.9;
/// Confidence cap for rule-pass wins.
const RULE_PASS_CONFIDENCE_CAP: f64 = 0.95;
/// Confidence used for the final collapse-to-default behavior.
const DEFAULT_CONFIDENCE: f64 = 0.3;
/// Minimum margin a rule-pass winner must have over the runner-up to be
/// considered unambiguous.
const MARGIN_THRESHOLD: u32 = 2;

static DEBUG_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(fix|bug|error|crash|broken|failing|exception|traceback|debug|not\s+working|doesn'?t\s+work)\b")
        .expect("invalid regex")
});

static REFACTOR_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(refactor|clean\s*up|restructure|reorganize|simplify|rewrite|modernize|extract)\b")
        .expect("invalid regex")
});

static GENERATE_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(create|build|implement|design|write|generate|add|scaffold|develop)\b")
        .expect("invalid regex")
});

static EXPLAIN_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(explain|analyze|describe|why|how\s+does|walk\s+me\s+through|understand)\b")
        .expect("invalid regex")
});

/// Classifies raw ideas into one of the four intent labels.
pub struct IntentClassifier {
    llm: Option<Arc<dyn LLMClient>>,
    model: String,
}

impl IntentClassifier {
    /// Construct a classifier with no LLM fallback; ambiguous rule passes
    /// collapse directly to the default.
    pub fn new() -> Self {
        Self {
            llm: None,
            model: String::new(),
        }
    }

    /// Construct a classifier that falls back to `llm` when the rule pass
    /// is ambiguous.
    pub fn with_llm(llm: Arc<dyn LLMClient>, model: impl Into<String>) -> Self {
        Self {
            llm: Some(llm),
            model: model.into(),
        }
    }

    fn rule_scores(idea: &str) -> [(Intent, u32); 4] {
        [
            (Intent::Debug, DEBUG_KEYWORDS.find_iter(idea).count() as u32),
            (Intent::Refactor, REFACTOR_KEYWORDS.find_iter(idea).count() as u32),
            (Intent::Generate, GENERATE_KEYWORDS.find_iter(idea).count() as u32),
            (Intent::Explain, EXPLAIN_KEYWORDS.find_iter(idea).count() as u32),
        ]
    }

    /// Rule pass: returns `Some` only when exactly one intent's evidence
    /// score clears the configured margin over all others.
    fn rule_pass(idea: &str) -> Option<IntentResult> {
        let scores = Self::rule_scores(idea);
        let mut sorted = scores;
        sorted.sort_by(|a, b| b.1.cmp(&a.1));

        let (winner, top_score) = sorted[0];
        if top_score == 0 {
            return None;
        }
        let runner_up_score = sorted[1].1;
        if top_score.saturating_sub(runner_up_score) < MARGIN_THRESHOLD.min(top_score) && runner_up_score > 0 {
            return None;
        }

        let margin = top_score.saturating_sub(runner_up_score);
        let confidence = (0.5 + margin as f64 * 0.15).min(RULE_PASS_CONFIDENCE_CAP);
        Some(IntentResult {
            intent: winner,
            confidence,
        })
    }

    async fn llm_fallback(&self, idea: &str, context: Option<&str>) -> Option<IntentResult> {
        let llm = self.llm.as_ref()?;

        let prompt = format!(
            "Classify the intent of this request as exactly one of: DEBUG, REFACTOR, GENERATE, EXPLAIN.\n\
            Respond with JSON: {{\"intent\": \"...\", \"confidence\": 0.0-1.0}}\n\n\
            Idea: {idea}\nContext: {}",
            context.unwrap_or("")
        );

        let request = CompletionRequest::new()
            .with_model(&self.model)
            .with_message(ChatMessage::user(prompt))
            .with_temperature(0.0);

        let response = match llm.complete(request).await {
            Ok(r) => r,
            Err(e) => {
                warn!("intent LLM fallback failed: {e}");
                return None;
            }
        };

        let text = response.content.as_str();
        let value: serde_json::Value = serde_json::from_str(text.trim()).ok().or_else(|| {
            let start = text.find('{')?;
            let end = text.rfind('}')?;
            serde_json::from_str(&text[start..=end]).ok()
        })?;

        let label = value.get("intent")?.as_str()?;
        let intent = Intent::parse_label(label)?;
        let confidence = value
            .get("confidence")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.5)
            .clamp(0.0, LLM_FALLBACK_CONFIDENCE_CAP);

        Some(IntentResult { intent, confidence })
    }

    /// Classify `idea` (and optional `context`). Never fails: unrecoverable
    /// errors collapse to `GENERATE` at `DEFAULT_CONFIDENCE` with a logged
    /// warning, per spec.
    pub async fn classify(&self, idea: &str, context: Option<&str>) -> IntentResult {
        if let Some(result) = Self::rule_pass(idea) {
            return result;
        }

        if let Some(result) = self.llm_fallback(idea, context).await {
            return result;
        }

        warn!("intent classification fell through to default (GENERATE)");
        IntentResult {
            intent: Intent::Generate,
            confidence: DEFAULT_CONFIDENCE,
        }
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_debug_keywords_win() {
        let classifier = IntentClassifier::new();
        let result = classifier
            .classify("Fix the bug causing a crash on startup", None)
            .await;
        assert_eq!(result.intent, Intent::Debug);
        assert!(result.confidence <= RULE_PASS_CONFIDENCE_CAP);
    }

    #[tokio::test]
    async fn test_generate_keywords_win() {
        let classifier = IntentClassifier::new();
        let result = classifier
            .classify("Write a function to reverse a string", None)
            .await;
        assert_eq!(result.intent, Intent::Generate);
    }

    #[tokio::test]
    async fn test_explain_keywords_win() {
        let classifier = IntentClassifier::new();
        let result = classifier
            .classify("Explain why this function returns None", None)
            .await;
        assert_eq!(result.intent, Intent::Explain);
    }

    #[tokio::test]
    async fn test_refactor_keywords_win() {
        let classifier = IntentClassifier::new();
        let result = classifier
            .classify("Refactor this module to simplify the control flow", None)
            .await;
        assert_eq!(result.intent, Intent::Refactor);
    }

    #[tokio::test]
    async fn test_ambiguous_idea_without_llm_defaults_to_generate() {
        let classifier = IntentClassifier::new();
        let result = classifier.classify("hello there", None).await;
        assert_eq!(result.intent, Intent::Generate);
        assert_eq!(result.confidence, DEFAULT_CONFIDENCE);
    }

    #[test]
    fn test_intent_display_round_trips_through_parse_label() {
        for intent in [Intent::Debug, Intent::Refactor, Intent::Generate, Intent::Explain] {
            let label = intent.to_string();
            assert_eq!(Intent::parse_label(&label), Some(intent));
        }
    }

    #[test]
    fn test_analyze_alias_maps_to_explain() {
        assert_eq!(Intent::parse_label("ANALYZE"), Some(Intent::Explain));
    }
}
