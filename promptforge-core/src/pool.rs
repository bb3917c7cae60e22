//! Example Pool & KNN Selector (C4).
//!
//! A curated, deduplicated, domain-tagged corpus of exemplar (raw idea →
//! structured prompt) pairs. Loaded once at startup from a JSON corpus file
//! and immutable thereafter; queries run lock-free over the in-memory
//! vector. The similarity metric is deterministic: Jaccard overlap of
//! stopword-stripped token sets, damped by the relative length difference
//! between query and candidate.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::warn;

/// The reasoning technique a prompt is framed around.
pub const FRAMEWORK_VALUES: &[&str] = &[
    "chain-of-thought",
    "tree-of-thoughts",
    "decomposition",
    "role-playing",
];

/// Default framework substituted for unrecognized values on ingestion.
pub const DEFAULT_FRAMEWORK: &str = "chain-of-thought";

/// A curated exemplar: a (raw idea → structured prompt) pair used as a
/// few-shot demonstration.
///
/// Named `ExampleRecord` rather than `Example` to avoid ambiguity with
/// domain terms like "example pool" when referenced unqualified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExampleRecord {
    pub original_idea: String,
    #[serde(default)]
    pub context: Option<String>,
    pub improved_prompt: String,
    pub role: String,
    pub directive: String,
    pub framework: String,
    pub guardrails: Vec<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    /// Deterministic hash of (original_idea, improved_prompt). Computed on
    /// ingestion if absent from the source record.
    #[serde(default)]
    pub io_hash: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

impl ExampleRecord {
    /// Deterministic hash of `(original_idea, improved_prompt)`.
    pub fn compute_io_hash(original_idea: &str, improved_prompt: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(original_idea.as_bytes());
        hasher.update([0u8]);
        hasher.update(improved_prompt.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Top-level shape of an example pool file: either a bare JSON array, or an
/// object with a `metadata` field and an `examples` array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PoolFile {
    Bare(Vec<serde_json::Value>),
    Wrapped {
        #[serde(default)]
        #[allow(dead_code)]
        metadata: serde_json::Value,
        examples: Vec<serde_json::Value>,
    },
}

/// A normalized, deduplicated corpus of examples queried by KNN.
///
/// Immutable after construction; queries require no locking.
#[derive(Debug, Default)]
pub struct ExamplePool {
    examples: Vec<ExampleRecord>,
    duplicate_count: usize,
}

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "of", "to", "in", "on", "for", "with", "is", "are",
    "be", "that", "this", "it", "as", "at", "by", "from", "into", "about", "was", "were",
];

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(|w| w.to_lowercase())
        .filter(|w| !w.is_empty() && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

impl ExamplePool {
    /// An empty pool. Used when the corpus file is missing or fails to
    /// load; KNN queries degrade to `[]` and callers downgrade to Simple.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load and normalize a corpus from `path`. Returns an empty pool (with
    /// a logged warning) if the file is missing or unparseable, per the
    /// documented failure policy — never an error to the caller.
    pub fn load_from_path(path: &str) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("example pool file {path} could not be read: {e}; pool initialized empty");
                return Self::empty();
            }
        };
        Self::load_from_str(&raw)
    }

    /// Parse and normalize a corpus from a JSON string.
    pub fn load_from_str(raw: &str) -> Self {
        let parsed: PoolFile = match serde_json::from_str(raw) {
            Ok(p) => p,
            Err(e) => {
                warn!("example pool JSON could not be parsed: {e}; pool initialized empty");
                return Self::empty();
            }
        };
        let candidates = match parsed {
            PoolFile::Bare(v) => v,
            PoolFile::Wrapped { examples, .. } => examples,
        };

        let mut accepted: Vec<ExampleRecord> = Vec::with_capacity(candidates.len());
        let mut seen_hashes: HashSet<String> = HashSet::new();
        let mut duplicate_count = 0usize;

        for (index, value) in candidates.into_iter().enumerate() {
            let mut record: ExampleRecord = match serde_json::from_value(value) {
                Ok(r) => r,
                Err(e) => {
                    warn!("example pool entry {index} rejected: malformed ({e})");
                    continue;
                }
            };

            if record.original_idea.trim().is_empty()
                || record.improved_prompt.trim().is_empty()
                || record.guardrails.is_empty()
            {
                warn!("example pool entry {index} rejected: missing required field");
                continue;
            }

            if !FRAMEWORK_VALUES.contains(&record.framework.as_str()) {
                warn!(
                    "example pool entry {index} has unknown framework {:?}; rewriting to {}",
                    record.framework, DEFAULT_FRAMEWORK
                );
                record.framework = DEFAULT_FRAMEWORK.to_string();
            }

            let io_hash = record
                .io_hash
                .clone()
                .unwrap_or_else(|| {
                    ExampleRecord::compute_io_hash(&record.original_idea, &record.improved_prompt)
                });

            if !seen_hashes.insert(io_hash.clone()) {
                duplicate_count += 1;
                continue;
            }
            record.io_hash = Some(io_hash);

            accepted.push(record);
        }

        if duplicate_count > 0 {
            warn!("example pool ingestion dropped {duplicate_count} duplicate io_hash entries");
        }

        Self {
            examples: accepted,
            duplicate_count,
        }
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn duplicate_count(&self) -> usize {
        self.duplicate_count
    }

    /// Select up to `k` examples most similar to `query_text`.
    ///
    /// Empty query returns the first `min(k, len)` examples in ingestion
    /// order — a deterministic "canonical" selection, per spec.
    pub fn select(&self, query_text: &str, k: usize) -> Vec<&ExampleRecord> {
        if self.examples.is_empty() || k == 0 {
            return Vec::new();
        }

        let query_tokens = tokenize(query_text);
        if query_tokens.is_empty() {
            return self.examples.iter().take(k).collect();
        }

        let mut scored: Vec<(usize, f64)> = self
            .examples
            .iter()
            .enumerate()
            .map(|(i, ex)| (i, similarity(&query_tokens, query_text, ex)))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        scored
            .into_iter()
            .take(k)
            .map(|(i, _)| &self.examples[i])
            .collect()
    }
}

fn similarity(query_tokens: &HashSet<String>, query_text: &str, candidate: &ExampleRecord) -> f64 {
    let candidate_tokens = tokenize(&candidate.original_idea);
    if candidate_tokens.is_empty() {
        return 0.0;
    }

    let intersection = query_tokens.intersection(&candidate_tokens).count();
    let union = query_tokens.union(&candidate_tokens).count();
    let jaccard = if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    };

    let len_query = query_text.split_whitespace().count().max(1);
    let len_candidate = candidate.original_idea.split_whitespace().count();
    let diff = (len_candidate as isize - len_query as isize).unsigned_abs() as f64;
    let damping = 1.0 / (1.0 + diff / len_query as f64);

    jaccard * damping
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(idea: &str, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "original_idea": idea,
            "improved_prompt": prompt,
            "role": "senior engineer",
            "directive": "do the thing",
            "framework": "chain-of-thought",
            "guardrails": ["Keep it minimal"],
        })
    }

    #[test]
    fn test_empty_file_yields_empty_pool() {
        let pool = ExamplePool::load_from_str("[]");
        assert!(pool.is_empty());
        assert_eq!(pool.select("anything", 3), Vec::<&ExampleRecord>::new());
    }

    #[test]
    fn test_malformed_json_yields_empty_pool() {
        let pool = ExamplePool::load_from_str("not json");
        assert!(pool.is_empty());
    }

    #[test]
    fn test_rejects_entries_with_empty_guardrails() {
        let raw = serde_json::json!([{
            "original_idea": "Fix the bug",
            "improved_prompt": "You are...",
            "role": "engineer",
            "directive": "fix it",
            "framework": "chain-of-thought",
            "guardrails": [],
        }])
        .to_string();
        let pool = ExamplePool::load_from_str(&raw);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_unknown_framework_is_rewritten_to_default() {
        let raw = serde_json::json!([{
            "original_idea": "Refactor the module",
            "improved_prompt": "You are a refactoring expert...",
            "role": "engineer",
            "directive": "refactor",
            "framework": "zero-shot",
            "guardrails": ["Preserve behavior"],
        }])
        .to_string();
        let pool = ExamplePool::load_from_str(&raw);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.select("refactor", 1)[0].framework, DEFAULT_FRAMEWORK);
    }

    #[test]
    fn test_duplicate_io_hash_keeps_first() {
        let entry = sample_record("Write a parser", "You are a parsing expert...");
        let raw = serde_json::json!([entry, entry]).to_string();
        let pool = ExamplePool::load_from_str(&raw);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.duplicate_count(), 1);
    }

    #[test]
    fn test_no_two_examples_share_io_hash() {
        let raw = serde_json::json!([
            sample_record("Write a parser", "prompt A"),
            sample_record("Write a linter", "prompt B"),
            sample_record("Write a formatter", "prompt C"),
        ])
        .to_string();
        let pool = ExamplePool::load_from_str(&raw);
        let hashes: HashSet<_> = pool.examples.iter().map(|e| e.io_hash.clone()).collect();
        assert_eq!(hashes.len(), pool.len());
    }

    #[test]
    fn test_select_returns_most_similar_first() {
        let raw = serde_json::json!([
            sample_record("Fix a race condition in the upload handler", "prompt A"),
            sample_record("Write a haiku about the ocean", "prompt B"),
        ])
        .to_string();
        let pool = ExamplePool::load_from_str(&raw);
        let results = pool.select("Debug a race condition in file upload", 1);
        assert_eq!(results.len(), 1);
        assert!(results[0].original_idea.contains("race condition"));
    }

    #[test]
    fn test_empty_query_returns_canonical_order() {
        let raw = serde_json::json!([
            sample_record("first idea", "prompt A"),
            sample_record("second idea", "prompt B"),
            sample_record("third idea", "prompt C"),
        ])
        .to_string();
        let pool = ExamplePool::load_from_str(&raw);
        let results = pool.select("   ", 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].original_idea, "first idea");
        assert_eq!(results[1].original_idea, "second idea");
    }

    #[test]
    fn test_select_is_stable_across_repeated_calls() {
        let raw = serde_json::json!([
            sample_record("Implement a cache", "prompt A"),
            sample_record("Implement a queue", "prompt B"),
        ])
        .to_string();
        let pool = ExamplePool::load_from_str(&raw);
        let first = pool.select("Implement a cache layer", 2);
        let second = pool.select("Implement a cache layer", 2);
        let first_ideas: Vec<_> = first.iter().map(|e| e.original_idea.clone()).collect();
        let second_ideas: Vec<_> = second.iter().map(|e| e.original_idea.clone()).collect();
        assert_eq!(first_ideas, second_ideas);
    }

    #[test]
    fn test_select_k_zero_returns_empty() {
        let raw = serde_json::json!([sample_record("idea", "prompt")]).to_string();
        let pool = ExamplePool::load_from_str(&raw);
        assert!(pool.select("idea", 0).is_empty());
    }

    #[test]
    fn test_io_hash_is_deterministic() {
        let a = ExampleRecord::compute_io_hash("idea", "prompt");
        let b = ExampleRecord::compute_io_hash("idea", "prompt");
        assert_eq!(a, b);
    }

    fn example_with_idea(idea: &str) -> ExampleRecord {
        ExampleRecord {
            original_idea: idea.to_string(),
            context: None,
            improved_prompt: "prompt".to_string(),
            role: "senior engineer".to_string(),
            directive: "do the thing".to_string(),
            framework: DEFAULT_FRAMEWORK.to_string(),
            guardrails: vec!["Keep it minimal".to_string()],
            domain: None,
            confidence: None,
            io_hash: None,
            source: None,
        }
    }

    proptest::proptest! {
        #[test]
        fn similarity_stays_within_unit_interval(
            query in "[a-z ]{0,40}",
            candidate_idea in "[a-z ]{0,40}",
        ) {
            let query_tokens = tokenize(&query);
            let candidate = example_with_idea(&candidate_idea);
            let score = similarity(&query_tokens, &query, &candidate);
            proptest::prop_assert!((0.0..=1.0).contains(&score));
        }

        #[test]
        fn identical_idea_scores_maximally(idea in "[a-z]{1,20}( [a-z]{1,20}){0,5}") {
            let query_tokens = tokenize(&idea);
            proptest::prop_assume!(!query_tokens.is_empty());
            let candidate = example_with_idea(&idea);
            let score = similarity(&query_tokens, &idea, &candidate);
            proptest::prop_assert!((score - 1.0).abs() < 1e-9);
        }
    }
}
