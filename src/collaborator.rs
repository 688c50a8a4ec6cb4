//! Creative-reasoning collaborator boundary.
//!
//! The collaborator is an external text generator. Its replies are untrusted
//! free text: the executor only accepts the first well-formed line and never
//! tries to verify it symbolically. Tests substitute deterministic stubs.

use serde::{Deserialize, Serialize};

use crate::error::FallbackFailure;

/// Context submitted alongside a fallback prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackContext {
    /// The original problem statement.
    pub problem_text: String,
    /// The sub-problem being escalated. `None` for whole-chain escalation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_problem: Option<String>,
    /// Results of the steps completed so far, in order.
    pub prior_results: Vec<String>,
    /// The full option list.
    pub options: Vec<String>,
}

/// External text-generation service used when no tool applies.
pub trait CreativeReasoner: Send + Sync {
    /// Identity recorded in step thoughts ("fallback via <identity>").
    fn identity(&self) -> &str;

    /// Generate a reply for `prompt`.
    ///
    /// # Errors
    ///
    /// Returns a `FallbackFailure` when the service is unavailable, refuses
    /// the request, or crashes.
    fn generate(&self, prompt: &str, context: &FallbackContext) -> Result<String, FallbackFailure>;
}

/// A collaborator that is never available.
///
/// Used when the engine is built without one: every fallback fails and the
/// affected steps complete as unresolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledReasoner;

impl CreativeReasoner for DisabledReasoner {
    fn identity(&self) -> &str {
        "disabled"
    }

    fn generate(&self, _prompt: &str, _context: &FallbackContext) -> Result<String, FallbackFailure> {
        Err(FallbackFailure::Unavailable {
            reason: "no creative reasoner configured".to_string(),
        })
    }
}

/// Extract the well-formed part of a collaborator reply: the first non-blank
/// line, trimmed, truncated to `max_chars` characters.
///
/// # Errors
///
/// Returns `FallbackFailure::Malformed` for an empty or blank reply.
pub fn well_formed(reply: &str, max_chars: usize) -> Result<String, FallbackFailure> {
    let line = reply
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| FallbackFailure::Malformed {
            reason: "empty reply".to_string(),
        })?;
    Ok(line.chars().take(max_chars.max(1)).collect())
}

/// Builds the prompt for one sub-problem.
#[must_use]
pub fn step_prompt(problem_text: &str, sub_problem: &str) -> String {
    format!("Problem: {problem_text}\nTask: {sub_problem}\nReply with the result only.")
}

/// Builds the prompt for a whole-chain escalation.
#[must_use]
pub fn chain_prompt(problem_text: &str, options: &[String]) -> String {
    if options.is_empty() {
        format!("Problem: {problem_text}\nReply with the final answer only.")
    } else {
        format!(
            "Problem: {problem_text}\nOptions: {}\nReply with the final answer only.",
            options.join(" | ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_non_blank_line_is_taken() {
        assert_eq!(well_formed("\n  Second  \nbecause...", 64).unwrap(), "Second");
    }

    #[test]
    fn blank_reply_is_malformed() {
        assert!(matches!(well_formed(" \n\t", 64), Err(FallbackFailure::Malformed { .. })));
    }

    #[test]
    fn long_reply_is_truncated() {
        assert_eq!(well_formed("abcdef", 3).unwrap(), "abc");
    }

    #[test]
    fn disabled_reasoner_is_unavailable() {
        let ctx = FallbackContext {
            problem_text: "x".to_string(),
            sub_problem: None,
            prior_results: Vec::new(),
            options: Vec::new(),
        };
        assert!(matches!(
            DisabledReasoner.generate("x", &ctx),
            Err(FallbackFailure::Unavailable { .. })
        ));
    }

    #[test]
    fn chain_prompt_lists_options() {
        let prompt = chain_prompt("Q?", &["A".to_string(), "B".to_string()]);
        assert!(prompt.contains("A | B"));
    }
}
