//! # Stepwise - Plan, Execute, Verify
//!
//! Stepwise answers closed-form multiple-choice puzzles by making its
//! reasoning explicit. Each problem is classified, decomposed into a plan,
//! executed step by step against deterministic tools with a creative
//! fallback, verified, scored, and finally matched against the offered
//! options.
//!
//! ## Core Concepts
//!
//! - **Problem**: immutable input (text, optional topic hint, options)
//! - **ReasoningPlan**: problem type, strategy, sub-problems and extracted constraints
//! - **ReasoningChain**: one step per sub-problem, each with thought, tool, result and confidence
//! - **VerificationResult**: issues, suggestions and the authoritative confidence
//! - **SolutionResult**: the selected option, its confidence and the chain behind it
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stepwise::{Capability, CapabilityRegistry, SolveEngine, ToolReport, ToolValue};
//!
//! let tools = CapabilityRegistry::new().with_fn(Capability::Arithmetic, |payload| {
//!     let rate: f64 = payload.numbers.iter().map(|n| 1.0 / n).sum();
//!     Ok(ToolReport::new(ToolValue::Number(1.0 / rate)))
//! })?;
//!
//! let engine = SolveEngine::builder().tools(tools).build();
//! let result = engine.solve_text(
//!     "Three machines can complete a job in 12, 6, and 4 hours respectively. How long together?",
//!     None,
//!     &["2 hours", "3 hours", "4 hours", "5 hours", "Another answer"],
//! )?;
//! assert_eq!(result.answer, "2 hours");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Inputs and shared types
pub mod confidence;
pub mod error;
pub mod problem;
pub mod text;

// Pipeline stages
pub mod chain;
pub mod classifier;
pub mod executor;
pub mod plan;
pub mod selector;
pub mod verifier;

// Collaborator boundaries
pub mod collaborator;
pub mod timeout;
pub mod tools;

// Orchestration
pub mod cache;
pub mod config;
pub mod engine;
pub mod runtime;

// Re-export primary types at crate root for convenience
pub use chain::{ChainTrace, ReasoningChain, ReasoningStep, StepOrigin, StepState, ToolOutcome, Verdict, UNRESOLVED};
pub use classifier::{Classification, ClassificationBasis, Classifier, KeywordTable, ProblemType, TypeKeywords};
pub use collaborator::{CreativeReasoner, DisabledReasoner, FallbackContext};
pub use confidence::{Confidence, ConfidenceBand};
pub use config::EngineConfig;
pub use engine::{SolutionResult, SolutionTrace, SolveEngine, SolveEngineBuilder, SolveStatistics};
pub use error::{ExecutionError, FallbackFailure, SolveError, SolveResult, ToolFailure, ValidationError};
pub use executor::{Executor, ExecutorConfig};
pub use plan::{AnswerFormat, ConstraintFact, Planner, PlannerConfig, ReasoningPlan, Strategy, SubProblem};
pub use problem::{Fingerprint, Problem, ProblemBuilder, ProblemId, ProblemSpec};
pub use runtime::{BatchConfig, BatchRuntime, CancelHandle};
pub use selector::{AnswerSelector, MatchKind, Selection, SelectorConfig};
pub use tools::{
    Capability, CapabilityRegistry, FnTool, Tool, ToolPayload, ToolRegistry, ToolReport, ToolValue, ValueKind,
};
pub use verifier::{Issue, IssueKind, ScoreInputs, VerificationResult, Verifier, VerifierConfig};
