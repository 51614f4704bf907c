//! Markdown rendering of workspaces for terminal display.

use super::model::{ProblemSpace, SolutionSpace, Workspace};

/// Render a full workspace snapshot.
pub fn render_workspace(workspace: &Workspace) -> String {
    let mut out = format!("# Workspace {} ({})\n\n", workspace.id, workspace.version);

    out.push_str(&render_problem_space(&workspace.problem_space));

    if let Some(ref space) = workspace.solution_space {
        out.push_str("\n---\n\n");
        out.push_str(&render_solution_space(space));
    }

    out
}

/// Render the problem space section.
pub fn render_problem_space(ps: &ProblemSpace) -> String {
    let mut out = String::from("## Problem Space\n\n");

    if !ps.context.is_empty() {
        out.push_str(&format!("**Context:** {}\n\n", ps.context));
    }

    out.push_str("### Invariants\n\n");
    push_list(&mut out, &ps.invariants, "_No invariants defined_");

    out.push_str("### Goal\n\n");
    out.push_str(&or_placeholder(&ps.goal, "_No goal defined_"));
    out.push_str("\n\n");

    out.push_str("### Problem\n\n");
    out.push_str(&or_placeholder(&ps.problem, "_No problem defined_"));
    out.push_str("\n\n");

    out.push_str("### Variants\n\n");
    push_list(&mut out, &ps.variants, "_No variants defined_");

    out
}

/// Render the solution space section.
pub fn render_solution_space(space: &SolutionSpace) -> String {
    let mut out = String::from("## Solution Space\n\n");

    for candidate in &space.candidates {
        out.push_str(&format!("### Candidate {}\n\n", candidate.id));
        out.push_str(&format!("**Hypothesis:** {}\n\n", candidate.hypothesis));
        out.push_str(&format!("**Model:**\n{}\n\n", candidate.model));
        if !candidate.reasoning.is_empty() {
            out.push_str(&format!("**Reasoning:** {}\n\n", candidate.reasoning));
        }
    }

    if let Some(ref comparison) = space.comparison {
        out.push_str("### Comparison\n\n");
        out.push_str(&comparison.analysis);
        out.push_str("\n\n");
        out.push_str(&format!("**Recommendation:** {}\n\n", comparison.recommendation));
    }

    if let Some(ref feedback) = space.simplification_feedback {
        out.push_str(&format!("**Simplification Idea:** {feedback}\n"));
    }

    out
}

fn push_list(out: &mut String, items: &[String], placeholder: &str) {
    if items.is_empty() {
        out.push_str(placeholder);
        out.push('\n');
    } else {
        for item in items {
            out.push_str(&format!("- {item}\n"));
        }
    }
    out.push('\n');
}

fn or_placeholder(text: &str, placeholder: &str) -> String {
    if text.trim().is_empty() {
        placeholder.to_string()
    } else {
        text.to_string()
    }
}
