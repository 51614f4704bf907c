//! Prompt templates and input helpers.
//!
//! Templates use `{name}` placeholders filled from [`PromptInputs`] in a
//! single pass, so braces inside inserted text are never expanded. String
//! inputs are inserted verbatim, everything else as compact JSON.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

use super::{PromptInputs, PromptKind};
use crate::document::{ProblemSpace, SolutionCandidate};

const PREAMBLE: &str = "You are a System Design Companion that helps a user think through \
the design of a system. Reply with a single JSON object and nothing else.";

const PROBLEM_BLOCK: &str = "Current Problem Space:
Context: {context}
Invariants: {invariants}
Goal: {goal}
Problem: {problem}
Variants: {variants}";

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([a-z_]+)\}").unwrap());

const EXTRACT_PROBLEM: &str = "Turn the user's unstructured description into a formal Problem \
Space, starting from the current one.

{problem_block}

User input: {chat_input}

Definitions:
- context: one sentence saying what the system is.
- invariants: constraints that are fixed, each phrased with \"must\".
- goal: one sentence describing the desired outcome.
- problem: the tension that prevents the goal under the invariants. No solutions.
- variants: degrees of freedom, each a neutral noun phrase naming what could vary and its \
current state, e.g. \"Hardware resources (currently: 12 CPU x 64GB RAM)\".

Never phrase a variant as an action (use, add, migrate, build, switch, ...). Convert requests \
for action into the axis they vary.

Return the complete updated Problem Space.";

const CHECK_CONSISTENCY: &str = "Review this Problem Space for internal consistency, using \
only what it states.

{problem_block}

Look for:
1. Invariants or the problem statement that make the goal unreachable.
2. Invariants that contradict a variant.
3. A problem statement that does not follow from the invariants and goal.

Return {\"items\": [...]} with one short observation per issue. Do not propose fixes. If \
everything is coherent return an empty list or the single item \"Consistent\".";

const REFINE_PROBLEM: &str = "Refine this Problem Space using the consistency observations.

{problem_block}

User's original input: {chat_input}

Observations:
{observations}

Adjust invariants, variants or the problem statement to resolve valid inconsistencies. Ignore \
observations that do not apply. Preserve the user's intent. Return the complete Problem Space.";

const GENERATE_CANDIDATE: &str = "You are acting as a principal software architect. Propose \
one solution candidate for this Problem Space that respects every invariant.

{problem_block}

Existing candidates (do not repeat these approaches):
{existing_candidates}

Return:
- hypothesis: which variants (or invariants) change, and how that resolves the problem.
- model: a technical description of the architecture: components, data flow, technologies.
- reasoning: why the model reaches the goal within the invariants, and the trade-offs accepted.";

const COMPARE_SOLUTIONS: &str = "Compare these solution candidates for the Problem Space.

{problem_block}

Candidates:
{candidates}

Return:
- analysis: pros, cons, complexity and cost of each candidate.
- recommendation: the candidate you recommend and why.
- simplification_feedback: one way to simplify the recommended candidate further.";

/// Inputs shared by every problem-space prompt.
pub fn problem_inputs(problem_space: &ProblemSpace) -> PromptInputs {
    let mut inputs = PromptInputs::new();
    inputs.insert("context".to_string(), Value::from(problem_space.context.as_str()));
    inputs.insert("invariants".to_string(), Value::from(problem_space.invariants.clone()));
    inputs.insert("goal".to_string(), Value::from(problem_space.goal.as_str()));
    inputs.insert("problem".to_string(), Value::from(problem_space.problem.as_str()));
    inputs.insert("variants".to_string(), Value::from(problem_space.variants.clone()));
    inputs
}

/// One `- observation` line per item.
pub fn format_observations(observations: &[String]) -> String {
    observations.iter().map(|o| format!("- {o}")).collect::<Vec<_>>().join("\n")
}

/// Summarize candidates as negative examples: hypothesis plus the first
/// `max_chars` characters of the model.
pub fn summarize_candidates(candidates: &[SolutionCandidate], max_chars: usize) -> String {
    if candidates.is_empty() {
        return "None yet.".to_string();
    }

    candidates
        .iter()
        .map(|c| {
            let mut model: String = c.model.chars().take(max_chars).collect();
            if c.model.chars().count() > max_chars {
                model.push_str("...");
            }
            format!("{}. Hypothesis: {}\n   Model: {}", c.id, c.hypothesis, model)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fill the template for `kind` from `inputs`.
pub fn render_prompt(kind: PromptKind, inputs: &PromptInputs) -> String {
    let template = match kind {
        PromptKind::ExtractProblem => EXTRACT_PROBLEM,
        PromptKind::CheckConsistency => CHECK_CONSISTENCY,
        PromptKind::RefineProblem => REFINE_PROBLEM,
        PromptKind::GenerateCandidate => GENERATE_CANDIDATE,
        PromptKind::CompareSolutions => COMPARE_SOLUTIONS,
    };

    let template = format!("{PREAMBLE}\n\n{}", template.replace("{problem_block}", PROBLEM_BLOCK));

    // Unknown placeholders stay as they are.
    PLACEHOLDER
        .replace_all(&template, |caps: &Captures<'_>| match inputs.get(&caps[1]) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn problem() -> ProblemSpace {
        ProblemSpace {
            context: "A payment processing system".into(),
            invariants: vec!["Must stay on-premise".into()],
            goal: "Handle 50k TPS".into(),
            problem: "The database locks at 5k TPS".into(),
            variants: vec!["Hardware resources (currently: 12 CPU)".into()],
        }
    }

    #[test]
    fn test_extract_prompt_contains_inputs() {
        let mut inputs = problem_inputs(&problem());
        inputs.insert("chat_input".into(), Value::from("We need to survive Black Friday"));

        let prompt = render_prompt(PromptKind::ExtractProblem, &inputs);
        assert!(prompt.contains("Context: A payment processing system"));
        assert!(prompt.contains(r#"Invariants: ["Must stay on-premise"]"#));
        assert!(prompt.contains("User input: We need to survive Black Friday"));
        assert!(!prompt.contains("{chat_input}"));
    }

    #[test]
    fn test_check_prompt_keeps_literal_braces() {
        let prompt = render_prompt(PromptKind::CheckConsistency, &problem_inputs(&problem()));
        assert!(prompt.contains(r#"{"items": [...]}"#));
        assert!(prompt.contains("Goal: Handle 50k TPS"));
    }

    #[test]
    fn test_braces_in_user_input_are_not_expanded() {
        let mut problem = problem();
        problem.goal = "SECRET_GOAL".into();
        let mut inputs = problem_inputs(&problem);
        inputs.insert("chat_input".into(), Value::from("literal {goal} token"));

        let prompt = render_prompt(PromptKind::ExtractProblem, &inputs);
        assert!(prompt.contains("User input: literal {goal} token"));
        assert!(prompt.contains("Goal: SECRET_GOAL"));
        assert_eq!(prompt.matches("SECRET_GOAL").count(), 1);
    }

    #[test]
    fn test_placeholders_in_inserted_fields_stay_literal() {
        let mut problem = problem();
        problem.context = "Uses {variants} as a keyword".into();

        let prompt = render_prompt(PromptKind::CheckConsistency, &problem_inputs(&problem));
        assert!(prompt.contains("Context: Uses {variants} as a keyword"));
    }

    #[test]
    fn test_format_observations() {
        let obs = vec!["Goal conflicts with invariant".to_string(), "Vague problem".to_string()];
        assert_eq!(format_observations(&obs), "- Goal conflicts with invariant\n- Vague problem");
        assert_eq!(format_observations(&[]), "");
    }

    #[test]
    fn test_summarize_truncates_models() {
        let candidates = vec![SolutionCandidate {
            id: 2,
            hypothesis: "Shard by merchant".into(),
            model: "x".repeat(50),
            reasoning: String::new(),
        }];

        let summary = summarize_candidates(&candidates, 10);
        assert!(summary.starts_with("2. Hypothesis: Shard by merchant"));
        assert!(summary.contains(&format!("Model: {}...", "x".repeat(10))));
        assert_eq!(summarize_candidates(&[], 10), "None yet.");
    }
}
