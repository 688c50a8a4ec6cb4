//! Plan execution.
//!
//! One step per sub-problem, in plan order. Each step tries the suggested
//! tool when it is registered, and escalates to the creative reasoner at
//! most once when no tool applies or the tool fails. A step always reaches
//! `StepState::Complete`; if both paths fail its result is `UNRESOLVED` with
//! zero confidence.
//!
//! Given fixed tool and collaborator replies, execution is deterministic.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::chain::{ReasoningChain, ReasoningStep, StepOrigin, StepState, ToolOutcome, UNRESOLVED};
use crate::collaborator::{chain_prompt, step_prompt, well_formed, CreativeReasoner, FallbackContext};
use crate::confidence::Confidence;
use crate::error::{FallbackFailure, ToolFailure};
use crate::plan::{AnswerFormat, ReasoningPlan, SubProblem};
use crate::problem::Problem;
use crate::text::{format_number, numbers};
use crate::timeout::{call_with_timeout, CallError};
use crate::tools::{Capability, ToolPayload, ToolRegistry, ToolReport, ToolValue};

/// Executor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Ceiling for one tool call. `None` disables the deadline.
    pub tool_timeout_ms: Option<u64>,
    /// Ceiling for one collaborator call. `None` disables the deadline.
    pub collaborator_timeout_ms: Option<u64>,
    /// Confidence assigned to an accepted collaborator reply.
    pub fallback_confidence: f64,
    /// Confidence assigned when a tool returns the "uncertain" marker.
    pub uncertain_confidence: f64,
    /// Collaborator replies are truncated to this many characters.
    pub max_reply_chars: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            tool_timeout_ms: Some(3_000),
            collaborator_timeout_ms: Some(30_000),
            fallback_confidence: 0.5,
            uncertain_confidence: 0.25,
            max_reply_chars: 256,
        }
    }
}

impl ExecutorConfig {
    /// Tool deadline.
    #[must_use]
    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout_ms.map(Duration::from_millis)
    }

    /// Collaborator deadline.
    #[must_use]
    pub fn collaborator_timeout(&self) -> Option<Duration> {
        self.collaborator_timeout_ms.map(Duration::from_millis)
    }
}

/// Runs plans against a tool registry and a creative reasoner.
#[derive(Clone)]
pub struct Executor {
    tools: Arc<dyn ToolRegistry>,
    reasoner: Arc<dyn CreativeReasoner>,
    config: ExecutorConfig,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("capabilities", &self.tools.capabilities())
            .field("reasoner", &self.reasoner.identity())
            .field("config", &self.config)
            .finish()
    }
}

impl Executor {
    /// Creates an executor.
    #[must_use]
    pub fn new(tools: Arc<dyn ToolRegistry>, reasoner: Arc<dyn CreativeReasoner>, config: ExecutorConfig) -> Self {
        Self { tools, reasoner, config }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute a plan and synthesize the final answer.
    #[must_use]
    pub fn execute(&self, problem: Arc<Problem>, plan: Arc<ReasoningPlan>) -> ReasoningChain {
        let numbers = numbers(&problem.text);
        let mut steps: Vec<ReasoningStep> = Vec::with_capacity(plan.sub_problems.len() + 1);

        for sub in &plan.sub_problems {
            let prior_results = resolved_results(&steps);
            let step = self.run_step(steps.len(), sub, &problem, &plan, &numbers, prior_results);
            steps.push(step);
        }

        let mut answer_step = steps.iter().rposition(ReasoningStep::is_resolved);
        if answer_step.is_none() {
            let step = self.escalate_chain(steps.len(), &problem, &steps);
            let resolved = step.is_resolved();
            steps.push(step);
            if resolved {
                answer_step = Some(steps.len() - 1);
            }
        }

        let final_answer = answer_step.and_then(|i| steps.get(i)).map(|s| s.result.clone());
        debug!(
            problem_id = %problem.id,
            steps = steps.len(),
            answer_step = ?answer_step,
            final_answer = final_answer.as_deref().unwrap_or(UNRESOLVED),
            "executed plan"
        );

        ReasoningChain {
            problem,
            plan,
            steps,
            final_answer,
            answer_step,
            overall_confidence: Confidence::ZERO,
        }
    }

    fn run_step(
        &self,
        index: usize,
        sub: &SubProblem,
        problem: &Problem,
        plan: &ReasoningPlan,
        numbers: &[f64],
        prior_results: Vec<String>,
    ) -> ReasoningStep {
        let mut step = ReasoningStep::pending(index, Some(sub.index), sub.description.clone());
        step.depends_on = sub.depends_on;

        let mut notes: Vec<String> = Vec::new();
        if let Some(dep) = sub.depends_on {
            notes.push(format!("builds on step {}", dep + 1));
        }

        match &sub.capability {
            Some(cap) if self.tools.has(cap) => {
                step.tool_used = Some(cap.clone());
                step.transition(StepState::ToolDispatched);
                let payload = ToolPayload {
                    problem_text: problem.text.clone(),
                    sub_problem: sub.description.clone(),
                    numbers: numbers.to_vec(),
                    constraints: plan.constraints.clone(),
                    prior_results: prior_results.clone(),
                    options: problem.options.clone(),
                };
                match self.invoke_tool(cap, payload) {
                    Ok(report) => {
                        step.transition(StepState::ToolSucceeded);
                        let confidence = self.tool_confidence(&report);
                        step.result = render_value(&report.value, plan.answer_format, plan.unit.as_deref());
                        step.tool_output = Some(ToolOutcome::Value { value: report.value });
                        step.confidence = confidence;
                        step.origin = StepOrigin::Tool;
                        notes.push(format!("{cap} on {} gave {}", list_numbers(numbers), step.result));
                        step.thought = notes.join("; ");
                        step.transition(StepState::Complete);
                        return step;
                    }
                    Err(failure) => {
                        warn!(step = index, capability = %cap, error = %failure, "tool failed");
                        step.tool_output = Some(ToolOutcome::Failed {
                            reason: failure.to_string(),
                        });
                        step.transition(StepState::ToolFailed);
                        notes.push(format!("{cap} failed: {failure}"));
                    }
                }
            }
            Some(cap) => notes.push(format!("{cap} not registered")),
            None => {}
        }

        // Exactly one escalation per step.
        step.transition(StepState::FallbackDispatched);
        let context = FallbackContext {
            problem_text: problem.text.clone(),
            sub_problem: Some(sub.description.clone()),
            prior_results,
            options: problem.options.clone(),
        };
        let prompt = step_prompt(&problem.text, &sub.description);
        match self.invoke_reasoner(prompt, context) {
            Ok(reply) => {
                step.transition(StepState::FallbackSucceeded);
                step.result = reply;
                step.confidence = Confidence::clamped(self.config.fallback_confidence);
                step.origin = StepOrigin::Fallback;
                notes.push(format!("fallback via {}", self.reasoner.identity()));
            }
            Err(failure) => {
                warn!(step = index, error = %failure, "fallback failed");
                step.transition(StepState::FallbackFailed);
                step.result = UNRESOLVED.to_string();
                step.confidence = Confidence::ZERO;
                step.origin = StepOrigin::Unresolved;
                notes.push(format!("fallback via {} failed: {failure}", self.reasoner.identity()));
            }
        }
        step.thought = notes.join("; ");
        step.transition(StepState::Complete);
        step
    }

    /// One escalation of the whole problem, appended as a synthetic step.
    fn escalate_chain(&self, index: usize, problem: &Problem, steps: &[ReasoningStep]) -> ReasoningStep {
        let mut step = ReasoningStep::pending(index, None, "escalate the whole problem");
        step.synthetic = true;
        step.transition(StepState::FallbackDispatched);

        let context = FallbackContext {
            problem_text: problem.text.clone(),
            sub_problem: None,
            prior_results: resolved_results(steps),
            options: problem.options.clone(),
        };
        let prompt = chain_prompt(&problem.text, &problem.options);
        match self.invoke_reasoner(prompt, context) {
            Ok(reply) => {
                step.transition(StepState::FallbackSucceeded);
                step.result = reply;
                step.confidence = Confidence::clamped(self.config.fallback_confidence);
                step.origin = StepOrigin::Fallback;
                step.thought = format!("no step resolved; whole-chain fallback via {}", self.reasoner.identity());
            }
            Err(failure) => {
                warn!(error = %failure, "whole-chain fallback failed");
                step.transition(StepState::FallbackFailed);
                step.thought = format!(
                    "no step resolved; whole-chain fallback via {} failed: {failure}",
                    self.reasoner.identity()
                );
            }
        }
        step.transition(StepState::Complete);
        step
    }

    fn invoke_tool(&self, capability: &Capability, payload: ToolPayload) -> Result<ToolReport, ToolFailure> {
        let tools = Arc::clone(&self.tools);
        let cap = capability.clone();
        let report = match call_with_timeout(capability.as_str(), self.config.tool_timeout(), move || {
            tools.invoke(&cap, &payload)
        }) {
            Ok(result) => result?,
            Err(CallError::TimedOut { duration_ms }) => return Err(ToolFailure::Timeout { duration_ms }),
            Err(CallError::Panicked) => {
                return Err(ToolFailure::Crashed {
                    reason: "tool panicked".to_string(),
                })
            }
            Err(CallError::Spawn { reason }) => return Err(ToolFailure::Crashed { reason }),
        };
        if !report.value.is_finite() {
            return Err(ToolFailure::numeric(format!("non-finite output {}", report.value)));
        }
        Ok(report)
    }

    fn invoke_reasoner(&self, prompt: String, context: FallbackContext) -> Result<String, FallbackFailure> {
        let reasoner = Arc::clone(&self.reasoner);
        let reply = match call_with_timeout("reasoner", self.config.collaborator_timeout(), move || {
            reasoner.generate(&prompt, &context)
        }) {
            Ok(result) => result?,
            Err(CallError::TimedOut { duration_ms }) => return Err(FallbackFailure::Timeout { duration_ms }),
            Err(CallError::Panicked) => {
                return Err(FallbackFailure::Crashed {
                    reason: "collaborator panicked".to_string(),
                })
            }
            Err(CallError::Spawn { reason }) => return Err(FallbackFailure::Crashed { reason }),
        };
        well_formed(&reply, self.config.max_reply_chars)
    }

    fn tool_confidence(&self, report: &ToolReport) -> Confidence {
        if report.value.is_uncertain() {
            return Confidence::clamped(self.config.uncertain_confidence);
        }
        report.certainty.map_or(Confidence::ONE, Confidence::clamped)
    }
}

fn resolved_results(steps: &[ReasoningStep]) -> Vec<String> {
    steps
        .iter()
        .filter(|s| s.is_resolved())
        .map(|s| s.result.clone())
        .collect()
}

fn list_numbers(numbers: &[f64]) -> String {
    if numbers.is_empty() {
        return "the problem text".to_string();
    }
    numbers.iter().map(|n| format_number(*n)).collect::<Vec<_>>().join(", ")
}

/// Render a tool value as a step result, honoring the expected answer
/// format and the plan's unit. The value itself is never altered; only
/// integral numbers lose their decimals.
#[must_use]
pub fn render_value(value: &ToolValue, format: AnswerFormat, unit: Option<&str>) -> String {
    match value {
        ToolValue::Number(n) => match (format, unit) {
            (AnswerFormat::Percentage, _) => format!("{}%", format_number(*n)),
            (_, Some(unit)) => format!("{} {unit}", format_number(*n)),
            (_, None) => format_number(*n),
        },
        ToolValue::Flag(true) if format == AnswerFormat::Boolean => "True".to_string(),
        ToolValue::Flag(false) if format == AnswerFormat::Boolean => "False".to_string(),
        other => other.to_string(),
    }
}
