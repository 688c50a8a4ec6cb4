//! Solve engine: Classifier → Planner → Executor → Verifier → Selector.
//!
//! `SolveEngine::solve` never fails. Tool and collaborator failures lower
//! confidence or leave steps unresolved; they are never raised to the
//! caller. Only input validation (`solve_text`) and the batch budget
//! (`BatchRuntime`) produce errors.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::chain::{ChainTrace, ReasoningChain, UNRESOLVED};
use crate::classifier::{Classifier, ProblemType};
use crate::collaborator::{CreativeReasoner, DisabledReasoner};
use crate::confidence::{Confidence, ConfidenceBand};
use crate::config::EngineConfig;
use crate::error::SolveResult;
use crate::executor::Executor;
use crate::plan::Planner;
use crate::problem::{Problem, ProblemId, ProblemSpec};
use crate::selector::{AnswerSelector, MatchKind};
use crate::timeout::millis;
use crate::tools::{CapabilityRegistry, ToolRegistry};
use crate::verifier::{VerificationResult, Verifier};

/// The externally returned result of one solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SolutionResult {
    pub problem_id: ProblemId,
    /// The selected option, or the raw answer when no options were given.
    pub answer: String,
    /// The chain's final answer before option matching.
    pub raw_answer: String,
    pub matched_option: Option<String>,
    pub match_kind: MatchKind,
    pub confidence: Confidence,
    pub execution_time: Duration,
    pub verification: VerificationResult,
    pub chain: Arc<ReasoningChain>,
}

impl SolutionResult {
    /// Returns true if the verifier accepted the chain.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.verification.valid
    }

    /// Problem type the chain was planned for.
    #[must_use]
    pub fn problem_type(&self) -> ProblemType {
        self.chain.plan.problem_type
    }

    /// Serializable record including timing.
    #[must_use]
    pub fn trace(&self) -> SolutionTrace {
        self.build_trace(Some(millis(self.execution_time)))
    }

    fn build_trace(&self, execution_time_ms: Option<u64>) -> SolutionTrace {
        SolutionTrace {
            problem_id: self.problem_id,
            answer: self.answer.clone(),
            raw_answer: self.raw_answer.clone(),
            matched_option: self.matched_option.clone(),
            match_kind: self.match_kind,
            confidence: self.confidence,
            execution_time_ms,
            verification: self.verification.clone(),
            chain: self.chain.trace(),
        }
    }

    /// JSON of every field except the execution time. Two solves of the
    /// same problem with deterministic collaborators produce identical
    /// output.
    ///
    /// # Errors
    ///
    /// Returns a serialization error from `serde_json`.
    pub fn canonical_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.build_trace(None))
    }
}

impl fmt::Display for SolutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.chain)?;
        write!(f, "{}", self.verification)?;
        write!(
            f,
            "Answer: {} ({:?} match, confidence {}, {} ms)",
            self.answer,
            self.match_kind,
            self.confidence,
            self.execution_time.as_millis()
        )
    }
}

/// Trace export record for one solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionTrace {
    pub problem_id: ProblemId,
    pub answer: String,
    pub raw_answer: String,
    pub matched_option: Option<String>,
    pub match_kind: MatchKind,
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
    pub verification: VerificationResult,
    pub chain: ChainTrace,
}

impl SolutionTrace {
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

/// Aggregate numbers over a set of results.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SolveStatistics {
    pub total: usize,
    pub valid: usize,
    pub mean_confidence: f64,
    pub mean_execution_ms: f64,
    pub high_confidence: usize,
    pub medium_confidence: usize,
    pub low_confidence: usize,
    pub by_type: BTreeMap<ProblemType, usize>,
}

impl SolveStatistics {
    /// Compute statistics. Empty input yields all zeros.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_results<'a, I>(results: I) -> Self
    where
        I: IntoIterator<Item = &'a SolutionResult>,
    {
        let mut stats = Self::default();
        let mut confidence_sum = 0.0;
        let mut ms_sum = 0.0;
        for r in results {
            stats.total += 1;
            if r.is_valid() {
                stats.valid += 1;
            }
            confidence_sum += r.confidence.value();
            ms_sum += r.execution_time.as_secs_f64() * 1000.0;
            match r.confidence.band() {
                ConfidenceBand::High => stats.high_confidence += 1,
                ConfidenceBand::Medium => stats.medium_confidence += 1,
                ConfidenceBand::Low => stats.low_confidence += 1,
            }
            *stats.by_type.entry(r.problem_type()).or_insert(0) += 1;
        }
        if stats.total > 0 {
            stats.mean_confidence = confidence_sum / stats.total as f64;
            stats.mean_execution_ms = ms_sum / stats.total as f64;
        }
        stats
    }
}

/// Orchestrates one solve per problem.
#[derive(Debug, Clone)]
pub struct SolveEngine {
    planner: Planner,
    executor: Executor,
    verifier: Verifier,
    selector: AnswerSelector,
    config: EngineConfig,
}

impl SolveEngine {
    /// Creates an engine.
    #[must_use]
    pub fn new(tools: Arc<dyn ToolRegistry>, reasoner: Arc<dyn CreativeReasoner>, config: EngineConfig) -> Self {
        Self {
            planner: Planner::new(Classifier::new(config.keywords.clone()), config.planner.clone()),
            executor: Executor::new(tools, reasoner, config.executor.clone()),
            verifier: Verifier::new(config.verifier.clone()),
            selector: AnswerSelector::new(config.selector.clone()),
            config,
        }
    }

    /// Creates a builder.
    #[must_use]
    pub fn builder() -> SolveEngineBuilder {
        SolveEngineBuilder::default()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the planner.
    #[must_use]
    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    /// Solve one problem.
    #[must_use]
    pub fn solve(&self, problem: &Problem) -> SolutionResult {
        let started = Instant::now();
        let problem = Arc::new(problem.clone());
        let plan = Arc::new(self.planner.create_plan(&problem));

        let mut chain = self.executor.execute(Arc::clone(&problem), plan);
        let verification = self.verifier.verify(&mut chain);

        let raw_answer = chain.final_answer.clone().unwrap_or_else(|| UNRESOLVED.to_string());
        let selection = self.selector.select(&raw_answer, &problem.options);

        let step_confidence = chain.answer_source().map_or(Confidence::ZERO, |s| s.confidence);
        let confidence = self
            .selector
            .adjust(selection.kind, verification.confidence.min(step_confidence));

        let execution_time = started.elapsed();
        info!(
            problem_id = %problem.id,
            answer = %selection.answer,
            match_kind = ?selection.kind,
            confidence = confidence.value(),
            valid = verification.valid,
            elapsed_ms = millis(execution_time),
            "solved problem"
        );

        SolutionResult {
            problem_id: problem.id,
            answer: selection.answer,
            raw_answer,
            matched_option: selection.matched_option,
            match_kind: selection.kind,
            confidence,
            execution_time,
            verification,
            chain: Arc::new(chain),
        }
    }

    /// Validate raw inputs and solve.
    ///
    /// # Errors
    ///
    /// Returns a validation error for blank or oversized text.
    pub fn solve_text(&self, text: &str, topic: Option<&str>, options: &[&str]) -> SolveResult<SolutionResult> {
        self.solve_spec(ProblemSpec::new(text, topic, options))
    }

    /// Validate a batch record and solve.
    ///
    /// # Errors
    ///
    /// Returns a validation error for blank or oversized text.
    pub fn solve_spec(&self, spec: ProblemSpec) -> SolveResult<SolutionResult> {
        let problem = Problem::try_from(spec)?;
        Ok(self.solve(&problem))
    }
}

impl Default for SolveEngine {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for `SolveEngine`.
#[derive(Default)]
pub struct SolveEngineBuilder {
    tools: Option<Arc<dyn ToolRegistry>>,
    reasoner: Option<Arc<dyn CreativeReasoner>>,
    config: EngineConfig,
}

impl SolveEngineBuilder {
    /// Set the tool registry. Defaults to an empty registry.
    #[must_use]
    pub fn tools(mut self, tools: impl ToolRegistry + 'static) -> Self {
        self.tools = Some(Arc::new(tools));
        self
    }

    /// Set a shared tool registry.
    #[must_use]
    pub fn shared_tools(mut self, tools: Arc<dyn ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Set the creative reasoner. Defaults to `DisabledReasoner`.
    #[must_use]
    pub fn reasoner(mut self, reasoner: impl CreativeReasoner + 'static) -> Self {
        self.reasoner = Some(Arc::new(reasoner));
        self
    }

    /// Set a shared creative reasoner.
    #[must_use]
    pub fn shared_reasoner(mut self, reasoner: Arc<dyn CreativeReasoner>) -> Self {
        self.reasoner = Some(reasoner);
        self
    }

    /// Set the configuration.
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the engine.
    #[must_use]
    pub fn build(self) -> SolveEngine {
        let tools = self.tools.unwrap_or_else(|| Arc::new(CapabilityRegistry::new()));
        let reasoner = self.reasoner.unwrap_or_else(|| Arc::new(DisabledReasoner));
        SolveEngine::new(tools, reasoner, self.config)
    }
}
