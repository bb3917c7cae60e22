//! Complexity Analyzer (C2).
//!
//! Scores a raw idea's structural and semantic richness into one of three
//! ordinal levels. The scorer is a weighted sum over token count,
//! conjunction/enumeration markers, code-fence presence, and domain jargon
//! density, mirroring the signal-weighting idiom used throughout this
//! crate's classifiers.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Ordinal complexity level derived from an idea's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ComplexityLevel {
    Simple,
    Moderate,
    Complex,
}

impl ComplexityLevel {
    /// Map a raw weighted score onto a level using fixed thresholds.
    fn from_score(score: f64) -> Self {
        if score < SIMPLE_CEILING {
            Self::Simple
        } else if score < MODERATE_CEILING {
            Self::Moderate
        } else {
            Self::Complex
        }
    }
}

impl std::fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Simple => "SIMPLE",
            Self::Moderate => "MODERATE",
            Self::Complex => "COMPLEX",
        };
        write!(f, "{s}")
    }
}

/// Score below which an idea is SIMPLE.
const SIMPLE_CEILING: f64 = 4.0;
/// Score below which an idea is MODERATE (at or above is COMPLEX).
const MODERATE_CEILING: f64 = 9.0;

/// Token count below which token volume contributes nothing to the score.
const TOKEN_FLOOR: usize = 8;
/// Token count at which the token-volume contribution saturates.
const TOKEN_CEILING: usize = 60;
/// Maximum contribution from token volume alone.
const TOKEN_MAX_WEIGHT: f64 = 4.0;

/// Fixed increment per conjunction/enumeration marker.
const CONJUNCTION_INCREMENT: f64 = 0.75;
/// Increment applied once if a code fence or structured syntax is present.
const CODE_FENCE_INCREMENT: f64 = 2.5;
/// Weight applied per matched domain-jargon keyword.
const JARGON_WEIGHT: f64 = 1.0;

static CONJUNCTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(and|then|after that|additionally|also|followed by)\b")
        .expect("invalid regex")
});

static NUMBERED_LIST_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(\d+[.)]|[-*])\s+").expect("invalid regex"));

static CODE_FENCE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```|`[^`]+`").expect("invalid regex"));

/// Domain keyword lists used for jargon density. Kept small and
/// illustrative per spec.md §4.2; additional domains can be added without
/// changing the scoring shape.
const DOMAIN_KEYWORDS: &[&str] = &[
    "authentication",
    "authorization",
    "concurrency",
    "race condition",
    "deadlock",
    "transaction",
    "idempotent",
    "migration",
    "schema",
    "throughput",
    "latency",
    "distributed",
    "consistency",
    "replication",
    "encryption",
    "middleware",
    "orchestration",
    "microservice",
    "kubernetes",
    "asynchronous",
];

/// Scores an idea (plus optional context) into a `ComplexityLevel`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComplexityAnalyzer;

impl ComplexityAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Compute the raw weighted score for an idea and optional context.
    ///
    /// Exposed separately from `analyze` so callers (and tests) can verify
    /// the monotonicity invariant directly: appending content to `idea`
    /// never decreases the score.
    pub fn score(&self, idea: &str, context: Option<&str>) -> f64 {
        let combined = match context {
            Some(ctx) if !ctx.trim().is_empty() => format!("{idea}\n{ctx}"),
            _ => idea.to_string(),
        };

        let token_count = combined.split_whitespace().count();
        let token_score = if token_count <= TOKEN_FLOOR {
            0.0
        } else {
            let span = (TOKEN_CEILING - TOKEN_FLOOR) as f64;
            let over = (token_count - TOKEN_FLOOR) as f64;
            (over / span).min(1.0) * TOKEN_MAX_WEIGHT
        };

        let conjunction_hits = CONJUNCTION_PATTERN.find_iter(&combined).count()
            + NUMBERED_LIST_PATTERN.find_iter(&combined).count();
        let conjunction_score = conjunction_hits as f64 * CONJUNCTION_INCREMENT;

        let code_fence_score = if CODE_FENCE_PATTERN.is_match(&combined) {
            CODE_FENCE_INCREMENT
        } else {
            0.0
        };

        let lower = combined.to_lowercase();
        let jargon_hits = DOMAIN_KEYWORDS
            .iter()
            .filter(|kw| lower.contains(*kw))
            .count();
        let jargon_score = jargon_hits as f64 * JARGON_WEIGHT;

        token_score + conjunction_score + code_fence_score + jargon_score
    }

    /// Classify an idea (plus optional context) into a `ComplexityLevel`.
    pub fn analyze(&self, idea: &str, context: Option<&str>) -> ComplexityLevel {
        ComplexityLevel::from_score(self.score(idea, context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_idea_is_simple() {
        let analyzer = ComplexityAnalyzer::new();
        assert_eq!(
            analyzer.analyze("Write a function to reverse a string", None),
            ComplexityLevel::Simple
        );
    }

    #[test]
    fn test_conjunctions_and_enumeration_raise_complexity() {
        let analyzer = ComplexityAnalyzer::new();
        let idea = "First validate the input, then parse it, and finally \
            persist the result. Also log every step along the way.";
        assert!(matches!(
            analyzer.analyze(idea, None),
            ComplexityLevel::Moderate | ComplexityLevel::Complex
        ));
    }

    #[test]
    fn test_code_fence_and_jargon_push_to_complex() {
        let analyzer = ComplexityAnalyzer::new();
        let idea = "Intermittent 500 errors when two users upload the same file \
            at the same time, likely a race condition in the transaction layer, \
            possibly related to replication and distributed consistency:\n```\nfn upload() {}\n```";
        assert_eq!(analyzer.analyze(idea, Some("Flask + S3")), ComplexityLevel::Complex);
    }

    #[test]
    fn test_monotonic_under_appended_content() {
        let analyzer = ComplexityAnalyzer::new();
        let base = "Explain how the cache works";
        let extended = format!(
            "{base} and then walk through the eviction policy, and also \
            describe the replication and consistency guarantees involved"
        );
        assert!(analyzer.score(&extended, None) >= analyzer.score(base, None));
    }

    #[test]
    fn test_empty_context_does_not_panic() {
        let analyzer = ComplexityAnalyzer::new();
        assert_eq!(analyzer.score("hi", Some("")), analyzer.score("hi", None));
    }

    #[test]
    fn test_complexity_level_ordering() {
        assert!(ComplexityLevel::Simple < ComplexityLevel::Moderate);
        assert!(ComplexityLevel::Moderate < ComplexityLevel::Complex);
    }
}
