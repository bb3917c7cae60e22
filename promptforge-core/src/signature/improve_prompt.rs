//! The `ImprovePrompt` signature: the typed I/O contract invoked by the
//! Prompt Generator (see `generator`).
//!
//! Inputs are the raw idea, optional context, and a list of few-shot demos
//! already rendered as prior turns. Outputs are the structured fields the
//! rest of the pipeline (quality gates, metrics, persistence) operate on.

use promptforge_core_derive::Signature;

/// Turn a raw, terse idea into a structured, production-grade prompt.
#[derive(Signature)]
#[signature(
    instructions = "You are an expert prompt engineer. Given a raw idea and optional \
    context, produce a structured, production-grade prompt. Respond with a JSON object \
    containing improved_prompt, role, directive, framework, guardrails, reasoning, and \
    confidence. framework must be one of: chain-of-thought, tree-of-thoughts, \
    decomposition, role-playing. guardrails must be a non-empty list of explicit \
    constraints rendered into the improved prompt."
)]
pub struct ImprovePrompt {
    #[input(desc = "The raw, possibly terse idea supplied by the user")]
    pub raw_idea: String,

    #[input(desc = "Optional surrounding context for the request")]
    pub context: Option<String>,

    #[input(desc = "Prior demonstrations rendered as additional guidance")]
    pub demos: Option<String>,

    #[output(desc = "The full rendered improved prompt text")]
    pub improved_prompt: String,

    #[output(desc = "The role the downstream LLM should assume")]
    pub role: String,

    #[output(desc = "The core directive of the improved prompt")]
    pub directive: String,

    #[output(desc = "The reasoning technique encoded in the improved prompt")]
    #[field(enum_values = "chain-of-thought,tree-of-thoughts,decomposition,role-playing")]
    pub framework: String,

    #[output(desc = "Explicit constraints rendered into the improved prompt")]
    pub guardrails: Vec<String>,

    #[output(desc = "Optional reasoning trace explaining the improvement")]
    pub reasoning: Option<String>,

    #[output(desc = "Optional self-reported confidence in [0,1]")]
    pub confidence: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::Signature as _;

    #[test]
    fn test_instructions_mention_framework_enum() {
        assert!(ImprovePrompt::instructions().contains("chain-of-thought"));
    }

    #[test]
    fn test_input_fields_include_raw_idea() {
        let fields = ImprovePrompt::input_fields();
        assert!(fields.iter().any(|f| f.name == "raw_idea" && f.required));
    }

    #[test]
    fn test_output_fields_include_guardrails_as_list() {
        let fields = ImprovePrompt::output_fields();
        let guardrails = fields.iter().find(|f| f.name == "guardrails").unwrap();
        assert!(matches!(
            guardrails.field_type,
            crate::signature::FieldType::List(_)
        ));
    }

    #[test]
    fn test_from_response_parses_full_payload() {
        let response = r#"{
            "improved_prompt": "You are a senior engineer...",
            "role": "senior software engineer",
            "directive": "Fix the described bug with a minimal, well-tested patch",
            "framework": "chain-of-thought",
            "guardrails": ["Do not change unrelated files", "Add a regression test"],
            "reasoning": "Debugging tasks benefit from step-by-step analysis",
            "confidence": 0.82
        }"#;

        let outputs = ImprovePrompt::from_response(response).expect("should parse");
        assert_eq!(outputs.framework, "chain-of-thought");
        assert_eq!(outputs.guardrails.len(), 2);
        assert_eq!(outputs.confidence, Some(0.82));
    }

    #[test]
    fn test_from_response_rejects_unknown_framework() {
        let response = r#"{
            "improved_prompt": "x",
            "role": "x",
            "directive": "x",
            "framework": "zero-shot",
            "guardrails": ["x"]
        }"#;

        assert!(ImprovePrompt::from_response(response).is_err());
    }
}
