//! Step and chain verification.
//!
//! The verifier marks every step passed or failed, runs the chain-level
//! checks and computes the authoritative confidence:
//!
//! ```text
//! confidence = 0.40 * passed_steps / total_steps
//!            + 0.20 * completed_sub_problems / planned_sub_problems
//!            + 0.20 * tool_steps / total_steps
//!            + 0.20 * (no critical issue)
//! ```
//!
//! Plan completeness and final-answer presence are critical. Constraint
//! references, dependency flow and bound checks only add issues.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chain::{ReasoningChain, ReasoningStep, ToolOutcome, Verdict, UNRESOLVED};
use crate::confidence::Confidence;
use crate::plan::{AnswerFormat, BoundKind, ConstraintFact};
use crate::text::{format_number, leading_number, normalize};

const STEP_PASS_WEIGHT: f64 = 0.40;
const COMPLETION_WEIGHT: f64 = 0.20;
const TOOL_USAGE_WEIGHT: f64 = 0.20;
const NO_CRITICAL_WEIGHT: f64 = 0.20;

/// What a verification issue is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    EmptyResult,
    NonFiniteToolOutput,
    UnexpectedToolOutput,
    EmptyThought,
    IncompletePlan,
    MissingFinalAnswer,
    UnreferencedConstraint,
    BrokenDependency,
    BoundViolated,
    PercentageOutOfRange,
}

impl IssueKind {
    /// Critical kinds zero the "no critical issue" term and invalidate the
    /// chain.
    #[must_use]
    pub const fn is_critical(self) -> bool {
        matches!(self, Self::IncompletePlan | Self::MissingFinalAnswer)
    }
}

/// One verification finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    /// Chain step the issue is about, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<usize>,
    pub critical: bool,
    pub message: String,
}

impl Issue {
    fn new(kind: IssueKind, step: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            kind,
            step,
            critical: kind.is_critical(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.critical {
            write!(f, "[critical] {}", self.message)
        } else {
            f.write_str(&self.message)
        }
    }
}

/// Counts the confidence formula is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScoreInputs {
    pub passed_steps: usize,
    pub total_steps: usize,
    pub completed_sub_problems: usize,
    pub planned_sub_problems: usize,
    pub tool_steps: usize,
    pub critical_issue: bool,
}

#[allow(clippy::cast_precision_loss)]
fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// The confidence formula.
#[must_use]
pub fn score(inputs: ScoreInputs) -> Confidence {
    let value = STEP_PASS_WEIGHT * ratio(inputs.passed_steps, inputs.total_steps)
        + COMPLETION_WEIGHT * ratio(inputs.completed_sub_problems, inputs.planned_sub_problems)
        + TOOL_USAGE_WEIGHT * ratio(inputs.tool_steps, inputs.total_steps)
        + if inputs.critical_issue { 0.0 } else { NO_CRITICAL_WEIGHT };
    Confidence::clamped(value)
}

/// Verifier configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Minimum confidence for a valid chain.
    pub validity_threshold: f64,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            validity_threshold: 0.5,
        }
    }
}

/// Verifier output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub valid: bool,
    pub issues: Vec<Issue>,
    pub suggestions: Vec<String>,
    pub confidence: Confidence,
}

impl VerificationResult {
    /// Returns true if any issue is critical.
    #[must_use]
    pub fn has_critical(&self) -> bool {
        self.issues.iter().any(|i| i.critical)
    }

    /// Issues of one kind.
    pub fn issues_of(&self, kind: IssueKind) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.kind == kind)
    }
}

impl fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Verification: {} (confidence {})",
            if self.valid { "valid" } else { "invalid" },
            self.confidence
        )?;
        for issue in &self.issues {
            writeln!(f, "  issue: {issue}")?;
        }
        for suggestion in &self.suggestions {
            writeln!(f, "  suggestion: {suggestion}")?;
        }
        Ok(())
    }
}

/// Checks chains and scores them.
#[derive(Debug, Clone, Default)]
pub struct Verifier {
    config: VerifierConfig,
}

impl Verifier {
    /// Creates a verifier.
    #[must_use]
    pub fn new(config: VerifierConfig) -> Self {
        Self { config }
    }

    /// Verify a chain, marking each step and writing the chain's overall
    /// confidence.
    pub fn verify(&self, chain: &mut ReasoningChain) -> VerificationResult {
        let mut issues = Vec::new();
        let mut suggestions = Vec::new();

        for step in &mut chain.steps {
            let found = check_step(step);
            if found.is_empty() {
                step.verified = Verdict::Passed;
            } else {
                step.verified = Verdict::Failed;
                step.confidence = Confidence::ZERO;
                issues.extend(found);
            }
        }

        let planned = chain.plan.sub_problems.len();
        let completed = completed_sub_problems(chain, &mut issues);
        if completed < planned {
            suggestions.push("Re-run the sub-problems that did not complete".to_string());
        }

        if chain.final_answer.as_deref().map_or(true, |a| a.trim().is_empty()) {
            issues.push(Issue::new(
                IssueKind::MissingFinalAnswer,
                None,
                "chain has no final answer",
            ));
            suggestions.push("Provide a tool or collaborator able to answer this problem type".to_string());
        }

        let unreferenced = check_constraints(chain, &mut issues);
        if unreferenced > 0 {
            suggestions.push("Reference every extracted quantity and unit in the reasoning".to_string());
        }

        if check_dependencies(chain, &mut issues) > 0 {
            suggestions.push("Resolve prerequisite steps before the steps that build on them".to_string());
        }

        if check_answer_bounds(chain, &mut issues) > 0 {
            suggestions.push("Re-check the final answer against the stated limits".to_string());
        }

        let inputs = ScoreInputs {
            passed_steps: chain.steps.iter().filter(|s| s.verified == Verdict::Passed).count(),
            total_steps: chain.steps.len(),
            completed_sub_problems: completed,
            planned_sub_problems: planned,
            tool_steps: chain.steps.iter().filter(|s| s.used_tool()).count(),
            critical_issue: issues.iter().any(|i| i.critical),
        };
        let confidence = score(inputs);
        chain.overall_confidence = confidence;

        let valid = confidence.value() >= self.config.validity_threshold && !inputs.critical_issue;
        debug!(
            problem_id = %chain.problem.id,
            passed = inputs.passed_steps,
            total = inputs.total_steps,
            tool_steps = inputs.tool_steps,
            issues = issues.len(),
            confidence = confidence.value(),
            valid,
            "verified chain"
        );

        VerificationResult {
            valid,
            issues,
            suggestions,
            confidence,
        }
    }
}

fn check_step(step: &ReasoningStep) -> Vec<Issue> {
    let mut found = Vec::new();
    let n = step.index + 1;

    if step.result.trim().is_empty() || step.result.trim() == UNRESOLVED {
        found.push(Issue::new(IssueKind::EmptyResult, Some(step.index), format!("step {n}: result is empty")));
    }

    if let (Some(cap), Some(ToolOutcome::Value { value })) = (&step.tool_used, &step.tool_output) {
        if !value.is_finite() {
            found.push(Issue::new(
                IssueKind::NonFiniteToolOutput,
                Some(step.index),
                format!("step {n}: {cap} output is not finite"),
            ));
        }
        let expected = cap.expected_kinds();
        if !value.is_uncertain() && expected.is_some_and(|kinds| !kinds.contains(&value.kind())) {
            found.push(Issue::new(
                IssueKind::UnexpectedToolOutput,
                Some(step.index),
                format!("step {n}: {cap} returned an unexpected {:?} value", value.kind()),
            ));
        }
    }

    if step.thought.trim().is_empty() {
        found.push(Issue::new(IssueKind::EmptyThought, Some(step.index), format!("step {n}: thought is empty")));
    }

    found
}

fn completed_sub_problems(chain: &ReasoningChain, issues: &mut Vec<Issue>) -> usize {
    let mut completed = 0;
    for sub in &chain.plan.sub_problems {
        let done = chain
            .steps
            .iter()
            .any(|s| s.sub_problem == Some(sub.index) && s.is_complete());
        if done {
            completed += 1;
        } else {
            issues.push(Issue::new(
                IssueKind::IncompletePlan,
                None,
                format!("sub-problem {} '{}' has no completed step", sub.index + 1, sub.description),
            ));
        }
    }
    completed
}

fn check_constraints(chain: &ReasoningChain, issues: &mut Vec<Issue>) -> usize {
    if chain.plan.constraints.is_empty() {
        return 0;
    }
    let mut haystack = String::new();
    for step in &chain.steps {
        haystack.push_str(&step.thought);
        haystack.push(' ');
        haystack.push_str(&step.result);
        haystack.push(' ');
    }
    let haystack = normalize(&haystack);

    let mut missing = 0;
    for fact in &chain.plan.constraints {
        if !fact.is_referenced_in(&haystack) {
            missing += 1;
            issues.push(Issue::new(
                IssueKind::UnreferencedConstraint,
                None,
                format!("constraint {fact} is not referenced by any step"),
            ));
        }
    }
    missing
}

fn check_dependencies(chain: &ReasoningChain, issues: &mut Vec<Issue>) -> usize {
    let mut broken = 0;
    for step in &chain.steps {
        let Some(dep) = step.depends_on else {
            continue;
        };
        let prerequisite = chain.steps.iter().find(|s| s.sub_problem == Some(dep));
        if prerequisite.map_or(true, |p| !p.is_resolved()) {
            broken += 1;
            issues.push(Issue::new(
                IssueKind::BrokenDependency,
                Some(step.index),
                format!("step {} builds on step {} which has no result", step.index + 1, dep + 1),
            ));
        }
    }
    broken
}

fn check_answer_bounds(chain: &ReasoningChain, issues: &mut Vec<Issue>) -> usize {
    let Some(value) = chain.final_answer.as_deref().and_then(leading_number) else {
        return 0;
    };
    let mut violated = 0;
    for fact in &chain.plan.constraints {
        if let ConstraintFact::Bound { kind, value: limit } = fact {
            let ok = match kind {
                BoundKind::Minimum => value >= *limit,
                BoundKind::Maximum => value <= *limit,
            };
            if !ok {
                violated += 1;
                issues.push(Issue::new(
                    IssueKind::BoundViolated,
                    chain.answer_step,
                    format!("final answer {} violates {fact}", format_number(value)),
                ));
            }
        }
    }
    if chain.plan.answer_format == AnswerFormat::Percentage && value > 100.0 {
        violated += 1;
        issues.push(Issue::new(
            IssueKind::PercentageOutOfRange,
            chain.answer_step,
            format!("percentage answer {} exceeds 100", format_number(value)),
        ));
    }
    violated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{StepOrigin, StepState};
    use crate::plan::Planner;
    use crate::problem::Problem;
    use crate::tools::{Capability, ToolValue};
    use std::sync::Arc;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn formula_matches_reference_values() {
        let c = score(ScoreInputs {
            passed_steps: 3,
            total_steps: 4,
            completed_sub_problems: 4,
            planned_sub_problems: 4,
            tool_steps: 2,
            critical_issue: false,
        });
        assert!(approx(c.value(), 0.80));

        let c = score(ScoreInputs {
            passed_steps: 4,
            total_steps: 4,
            completed_sub_problems: 4,
            planned_sub_problems: 4,
            tool_steps: 0,
            critical_issue: true,
        });
        assert!(approx(c.value(), 0.60));
    }

    #[test]
    fn empty_inputs_score_only_the_critical_term() {
        assert!(approx(score(ScoreInputs::default()).value(), 0.20));
    }

    fn completed_step(index: usize, result: &str) -> ReasoningStep {
        let mut step = ReasoningStep::pending(index, Some(index), format!("step {index}"));
        step.thought = "fallback via stub".to_string();
        step.result = result.to_string();
        step.origin = StepOrigin::Fallback;
        step.confidence = Confidence::clamped(0.5);
        step.transition(StepState::Complete);
        step
    }

    fn chain_for(text: &str, steps: Vec<ReasoningStep>, final_answer: Option<&str>) -> ReasoningChain {
        let problem = Arc::new(Problem::new(text, None, Vec::new()).unwrap());
        let plan = Arc::new(Planner::default().create_plan(&problem));
        ReasoningChain {
            problem,
            plan,
            steps,
            final_answer: final_answer.map(str::to_string),
            answer_step: None,
            overall_confidence: Confidence::ZERO,
        }
    }

    const RIDDLE: &str = "You overtake second place in a race. What position are you in?";

    #[test]
    fn all_fallback_chain_scores_point_eight() {
        let steps = (0..4).map(|i| completed_step(i, "Second")).collect();
        let mut chain = chain_for(RIDDLE, steps, Some("Second"));
        let result = Verifier::default().verify(&mut chain);
        assert!(approx(result.confidence.value(), 0.80));
        assert!(result.valid);
        assert_eq!(chain.overall_confidence, result.confidence);
        assert!(chain.steps.iter().all(|s| s.verified == Verdict::Passed));
    }

    #[test]
    fn missing_final_answer_is_critical() {
        let steps = (0..4).map(|i| completed_step(i, UNRESOLVED)).collect();
        let mut chain = chain_for(RIDDLE, steps, None);
        let result = Verifier::default().verify(&mut chain);
        assert!(!result.valid);
        assert!(result.has_critical());
        assert_eq!(result.issues_of(IssueKind::MissingFinalAnswer).count(), 1);
        assert_eq!(result.issues_of(IssueKind::EmptyResult).count(), 4);
        assert!(chain.steps.iter().all(|s| s.confidence == Confidence::ZERO));
        // 0 passed, 4/4 completed, no tools, critical.
        assert!(approx(result.confidence.value(), 0.20));
    }

    #[test]
    fn missing_step_makes_plan_incomplete() {
        let steps = (0..3).map(|i| completed_step(i, "Second")).collect();
        let mut chain = chain_for(RIDDLE, steps, Some("Second"));
        let result = Verifier::default().verify(&mut chain);
        assert_eq!(result.issues_of(IssueKind::IncompletePlan).count(), 1);
        assert!(!result.valid);
    }

    #[test]
    fn wrong_tool_value_type_fails_step() {
        let mut step = completed_step(2, "yes");
        step.tool_used = Some(Capability::Arithmetic);
        step.tool_output = Some(ToolOutcome::Value {
            value: ToolValue::Flag(true),
        });
        let issues = check_step(&step);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::UnexpectedToolOutput);
        assert!(issues[0].message.contains("step 3"));
    }

    #[test]
    fn non_finite_tool_output_fails_step() {
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let mut step = completed_step(2, "2");
            step.tool_used = Some(Capability::Arithmetic);
            step.tool_output = Some(ToolOutcome::Value {
                value: ToolValue::Number(value),
            });
            let issues = check_step(&step);
            assert_eq!(issues.len(), 1, "{value}");
            assert_eq!(issues[0].kind, IssueKind::NonFiniteToolOutput);
            assert!(!issues[0].critical);
        }

        let mut steps: Vec<_> = (0..4).map(|i| completed_step(i, "Second")).collect();
        steps[2].tool_used = Some(Capability::Arithmetic);
        steps[2].tool_output = Some(ToolOutcome::Value {
            value: ToolValue::Number(f64::NAN),
        });
        let mut chain = chain_for(RIDDLE, steps, Some("Second"));
        let result = Verifier::default().verify(&mut chain);
        assert_eq!(result.issues_of(IssueKind::NonFiniteToolOutput).count(), 1);
        assert_eq!(chain.steps[2].verified, Verdict::Failed);
        assert_eq!(chain.steps[2].confidence, Confidence::ZERO);
        assert_eq!(chain.steps[3].verified, Verdict::Passed);
    }

    #[test]
    fn step_built_on_unresolved_prerequisite_breaks_the_flow() {
        let mut steps: Vec<_> = (0..4).map(|i| completed_step(i, "Second")).collect();
        steps[0].result = UNRESOLVED.to_string();
        steps[1].depends_on = Some(0);
        steps[2].depends_on = Some(1);
        let mut chain = chain_for(RIDDLE, steps, Some("Second"));
        let result = Verifier::default().verify(&mut chain);

        let broken: Vec<_> = result.issues_of(IssueKind::BrokenDependency).collect();
        assert_eq!(broken.len(), 1);
        assert_eq!(broken[0].step, Some(1));
        assert!(!broken[0].critical);
        assert!(broken[0].message.contains("builds on step 1"));
        assert!(!result.has_critical());
    }

    #[test]
    fn unreferenced_constraints_are_non_critical() {
        let text = "Three machines can complete a job in 12, 6, and 4 hours respectively. How long together?";
        let steps = (0..4).map(|i| completed_step(i, "fast")).collect();
        let mut chain = chain_for(text, steps, Some("fast"));
        let result = Verifier::default().verify(&mut chain);
        assert!(result.issues_of(IssueKind::UnreferencedConstraint).count() > 0);
        assert!(!result.has_critical());
    }

    #[test]
    fn bound_violation_is_reported() {
        let text = "You need at least 5 coins. How many coins?";
        let steps = (0..4).map(|i| completed_step(i, "3 coins")).collect();
        let mut chain = chain_for(text, steps, Some("3 coins"));
        let result = Verifier::default().verify(&mut chain);
        assert_eq!(result.issues_of(IssueKind::BoundViolated).count(), 1);
        assert!(!result.has_critical());
    }
}
