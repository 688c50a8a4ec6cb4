//! Reasoning chain: the executor's output and the verifier's input.
//!
//! Steps are created by the executor in plan order and are only touched
//! afterwards by the verifier, which sets `verified` and may zero
//! `confidence`. A chain always holds at least one step.

use std::fmt;
use std::io;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classifier::ProblemType;
use crate::confidence::Confidence;
use crate::plan::{ReasoningPlan, Strategy};
use crate::problem::{Problem, ProblemId};
use crate::tools::{Capability, ToolValue};

/// Result recorded for a step that neither a tool nor the collaborator
/// could resolve.
pub const UNRESOLVED: &str = "unresolved";

/// Status strings that mark progress, not an answer.
const PLACEHOLDERS: [&str; 10] = [
    UNRESOLVED,
    ToolValue::UNCERTAIN_MARKER,
    "processed",
    "calculated",
    "verified",
    "analyzed",
    "identified",
    "equation_ready",
    "pattern_identified",
    "constraints_identified",
];

/// Returns true if `result` is a status string rather than an answer.
#[must_use]
pub fn is_placeholder(result: &str) -> bool {
    let r = result.trim();
    PLACEHOLDERS.iter().any(|p| r.eq_ignore_ascii_case(p))
}

/// Per-step state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Pending,
    ToolDispatched,
    ToolSucceeded,
    ToolFailed,
    FallbackDispatched,
    FallbackSucceeded,
    FallbackFailed,
    Complete,
}

/// Tri-state verification flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    #[default]
    Unverified,
    Passed,
    Failed,
}

/// Which path produced a step's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOrigin {
    Tool,
    Fallback,
    Unresolved,
}

/// Raw tool output or the failure marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ToolOutcome {
    Value { value: ToolValue },
    Failed { reason: String },
}

/// One executed sub-problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningStep {
    /// Position in the chain.
    pub index: usize,
    /// Plan sub-problem this step executes. `None` for the synthetic
    /// whole-chain escalation step.
    pub sub_problem: Option<usize>,
    pub action: String,
    pub thought: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_used: Option<Capability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_output: Option<ToolOutcome>,
    pub result: String,
    pub verified: Verdict,
    pub confidence: Confidence,
    /// Every state the step passed through, ending in `Complete`.
    pub states: Vec<StepState>,
    pub origin: StepOrigin,
    /// Plan sub-problem whose result this step builds on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<usize>,
    #[serde(default)]
    pub synthetic: bool,
}

impl ReasoningStep {
    /// A fresh step in `Pending`.
    #[must_use]
    pub fn pending(index: usize, sub_problem: Option<usize>, action: impl Into<String>) -> Self {
        Self {
            index,
            sub_problem,
            action: action.into(),
            thought: String::new(),
            tool_used: None,
            tool_output: None,
            result: UNRESOLVED.to_string(),
            verified: Verdict::Unverified,
            confidence: Confidence::ZERO,
            states: vec![StepState::Pending],
            origin: StepOrigin::Unresolved,
            depends_on: None,
            synthetic: false,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> StepState {
        self.states.last().copied().unwrap_or(StepState::Pending)
    }

    /// Record a state transition.
    pub fn transition(&mut self, next: StepState) {
        debug!(step = self.index, from = ?self.state(), to = ?next, "step transition");
        self.states.push(next);
    }

    /// Returns true once the step reached its terminal state.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state() == StepState::Complete
    }

    /// Returns true if the result is a usable answer: non-empty, not
    /// unresolved and not a status placeholder.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !self.result.trim().is_empty() && !is_placeholder(&self.result)
    }

    /// Returns true if a tool produced this step's result.
    #[must_use]
    pub fn used_tool(&self) -> bool {
        self.origin == StepOrigin::Tool
    }
}

/// An ordered sequence of steps for one problem.
#[derive(Debug, Clone, PartialEq)]
pub struct ReasoningChain {
    pub problem: Arc<Problem>,
    pub plan: Arc<ReasoningPlan>,
    pub steps: Vec<ReasoningStep>,
    pub final_answer: Option<String>,
    /// Index of the step whose result became the final answer.
    pub answer_step: Option<usize>,
    /// Written by the verifier.
    pub overall_confidence: Confidence,
}

impl ReasoningChain {
    /// The step that produced the final answer.
    #[must_use]
    pub fn answer_source(&self) -> Option<&ReasoningStep> {
        self.answer_step.and_then(|i| self.steps.get(i))
    }

    /// Returns the synthetic escalation step, if one was appended.
    #[must_use]
    pub fn escalation(&self) -> Option<&ReasoningStep> {
        self.steps.iter().find(|s| s.synthetic)
    }

    /// Serializable record of the chain.
    #[must_use]
    pub fn trace(&self) -> ChainTrace {
        ChainTrace {
            problem_id: self.problem.id,
            problem_text: self.problem.text.clone(),
            topic: self.problem.topic.clone(),
            options: self.problem.options.clone(),
            problem_type: self.plan.problem_type,
            strategy: self.plan.strategy,
            steps: self.steps.clone(),
            final_answer: self.final_answer.clone(),
            overall_confidence: self.overall_confidence,
        }
    }
}

impl fmt::Display for ReasoningChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Problem: {}", self.problem.text)?;
        writeln!(f, "Type: {} ({})", self.plan.problem_type, self.plan.strategy)?;
        for step in &self.steps {
            writeln!(f, "Step {}: {}", step.index + 1, step.action)?;
            writeln!(f, "  Thought: {}", step.thought)?;
            if let Some(tool) = &step.tool_used {
                writeln!(f, "  Tool: {tool}")?;
            }
            writeln!(
                f,
                "  Result: {} [{:?}, {}]",
                step.result, step.verified, step.confidence
            )?;
        }
        write!(
            f,
            "Final answer: {} (confidence {})",
            self.final_answer.as_deref().unwrap_or(UNRESOLVED),
            self.overall_confidence
        )
    }
}

/// Human-readable export record of a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainTrace {
    pub problem_id: ProblemId,
    pub problem_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    pub options: Vec<String>,
    pub problem_type: ProblemType,
    pub strategy: Strategy,
    pub steps: Vec<ReasoningStep>,
    pub final_answer: Option<String>,
    pub overall_confidence: Confidence,
}

impl ChainTrace {
    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns a serialization error from `serde_json`.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Write pretty-printed JSON to `writer`.
    ///
    /// # Errors
    ///
    /// Returns a serialization or I/O error from `serde_json`.
    pub fn write_json<W: io::Write>(&self, writer: W) -> serde_json::Result<()> {
        serde_json::to_writer_pretty(writer, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_not_answers() {
        let mut step = ReasoningStep::pending(0, Some(0), "compute");
        assert!(!step.is_resolved());
        step.result = "Calculated".to_string();
        assert!(!step.is_resolved());
        step.result = "2 hours".to_string();
        assert!(step.is_resolved());
    }

    #[test]
    fn transitions_are_recorded_in_order() {
        let mut step = ReasoningStep::pending(0, Some(0), "compute");
        step.transition(StepState::ToolDispatched);
        step.transition(StepState::ToolSucceeded);
        step.transition(StepState::Complete);
        assert!(step.is_complete());
        assert_eq!(
            step.states,
            vec![
                StepState::Pending,
                StepState::ToolDispatched,
                StepState::ToolSucceeded,
                StepState::Complete
            ]
        );
    }

    #[test]
    fn tool_outcome_serializes_tagged() {
        let outcome = ToolOutcome::Failed {
            reason: "numeric error: division by zero".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "failed");
    }
}
