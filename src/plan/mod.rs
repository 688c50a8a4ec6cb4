//! Planning: strategy selection and problem decomposition.
//!
//! `Planner::create_plan` never fails. A problem that neither its topic nor
//! its keywords classify gets a single generic sub-problem with
//! `Strategy::StepByStepLogic`.

pub mod constraints;
pub mod templates;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classifier::{Classification, ClassificationBasis, Classifier, ProblemType};
use crate::problem::Problem;
use crate::text::{contains_phrase, normalize};
use crate::tools::Capability;

pub use constraints::{dominant_unit, extract_constraints, BoundKind, ConstraintFact};
use templates::{template_for, TemplateStep, GENERIC};

/// How the executor should approach a problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    DirectCalculation,
    StepByStepLogic,
    PatternRecognition,
    ConstraintSatisfaction,
    SpatialVisualization,
    CreativeThinking,
}

impl Strategy {
    /// Default strategy for a problem type.
    #[must_use]
    pub const fn default_for(problem_type: ProblemType) -> Self {
        match problem_type {
            ProblemType::Mathematical => Self::DirectCalculation,
            ProblemType::Spatial => Self::SpatialVisualization,
            ProblemType::Logical => Self::StepByStepLogic,
            ProblemType::Sequence => Self::PatternRecognition,
            ProblemType::Optimization => Self::ConstraintSatisfaction,
            ProblemType::LateralThinking | ProblemType::ClassicRiddle => Self::CreativeThinking,
        }
    }

    /// Returns a short stable identifier.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::DirectCalculation => "direct_calculation",
            Self::StepByStepLogic => "step_by_step_logic",
            Self::PatternRecognition => "pattern_recognition",
            Self::ConstraintSatisfaction => "constraint_satisfaction",
            Self::SpatialVisualization => "spatial_visualization",
            Self::CreativeThinking => "creative_thinking",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Expected shape of the final answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerFormat {
    Integer,
    Percentage,
    Ratio,
    Value,
    Categorical,
    Boolean,
    Text,
}

impl AnswerFormat {
    /// Infer the format from question wording.
    #[must_use]
    pub fn detect(text: &str) -> Self {
        let t = normalize(text);
        if contains_phrase(&t, "how many") {
            Self::Integer
        } else if contains_phrase(&t, "true or false") {
            Self::Boolean
        } else if contains_phrase(&t, "what is the") {
            if contains_phrase(&t, "percentage") || contains_phrase(&t, "percent") || text.contains('%') {
                Self::Percentage
            } else if contains_phrase(&t, "ratio") {
                Self::Ratio
            } else {
                Self::Value
            }
        } else if contains_phrase(&t, "which") || contains_phrase(&t, "what") {
            Self::Categorical
        } else {
            Self::Text
        }
    }
}

/// One atomic task of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubProblem {
    /// Position in the plan (0-based).
    pub index: usize,
    pub description: String,
    /// Suggested tool capability; `None` means narrative reasoning only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<Capability>,
    /// Earlier sub-problem whose result this one builds on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<usize>,
}

/// Planner output, consumed read-only by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningPlan {
    pub problem_type: ProblemType,
    pub strategy: Strategy,
    pub classification: Classification,
    pub sub_problems: Vec<SubProblem>,
    pub constraints: Vec<ConstraintFact>,
    pub answer_format: AnswerFormat,
    /// Dominant unit of the quantities, used to render numeric answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl ReasoningPlan {
    /// Distinct capabilities the plan may need, in plan order.
    #[must_use]
    pub fn required_capabilities(&self) -> Vec<Capability> {
        let mut caps: Vec<Capability> = Vec::new();
        for cap in self.sub_problems.iter().filter_map(|s| s.capability.as_ref()) {
            if !caps.contains(cap) {
                caps.push(cap.clone());
            }
        }
        caps
    }

    /// Numbers from the extracted quantity facts, in order.
    #[must_use]
    pub fn quantities(&self) -> Vec<f64> {
        self.constraints
            .iter()
            .filter_map(|c| match c {
                ConstraintFact::Quantity { value, .. } => Some(*value),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for ReasoningPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Problem type: {}", self.problem_type)?;
        writeln!(f, "Strategy: {}", self.strategy)?;
        writeln!(f, "Sub-problems:")?;
        for sp in &self.sub_problems {
            match &sp.capability {
                Some(cap) => writeln!(f, "  {}. {} [{cap}]", sp.index + 1, sp.description)?,
                None => writeln!(f, "  {}. {}", sp.index + 1, sp.description)?,
            }
        }
        if self.constraints.is_empty() {
            writeln!(f, "Constraints: none identified")?;
        } else {
            let parts: Vec<String> = self.constraints.iter().map(ToString::to_string).collect();
            writeln!(f, "Constraints: {}", parts.join(", "))?;
        }
        write!(f, "Expected answer format: {:?}", self.answer_format)
    }
}

/// Planner configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Per-type strategy overrides.
    pub strategy_overrides: HashMap<ProblemType, Strategy>,
}

/// Classifies problems and decomposes them into plans.
#[derive(Debug, Clone, Default)]
pub struct Planner {
    classifier: Classifier,
    config: PlannerConfig,
}

impl Planner {
    /// Creates a planner.
    #[must_use]
    pub fn new(classifier: Classifier, config: PlannerConfig) -> Self {
        Self { classifier, config }
    }

    /// Returns the classifier.
    #[must_use]
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Select the strategy for a problem type, honoring overrides.
    #[must_use]
    pub fn select_strategy(&self, problem_type: ProblemType) -> Strategy {
        self.config
            .strategy_overrides
            .get(&problem_type)
            .copied()
            .unwrap_or_else(|| Strategy::default_for(problem_type))
    }

    /// Build a plan for a problem.
    #[must_use]
    pub fn create_plan(&self, problem: &Problem) -> ReasoningPlan {
        let classification = self.classifier.classify(&problem.text, problem.topic.as_deref());
        let problem_type = classification.problem_type;

        let (template, strategy): (&[TemplateStep], Strategy) = match classification.basis {
            ClassificationBasis::Default => (&GENERIC[..], Strategy::StepByStepLogic),
            _ => (template_for(problem_type), self.select_strategy(problem_type)),
        };

        let sub_problems = template
            .iter()
            .enumerate()
            .map(|(index, row)| SubProblem {
                index,
                description: row.description.to_string(),
                capability: row.capability.map(Capability::from),
                depends_on: row.depends_on,
            })
            .collect::<Vec<_>>();

        let constraints = extract_constraints(&problem.text);
        let unit = dominant_unit(&constraints);

        debug!(
            problem_id = %problem.id,
            problem_type = %problem_type,
            strategy = %strategy,
            sub_problems = sub_problems.len(),
            constraints = constraints.len(),
            "created plan"
        );

        ReasoningPlan {
            problem_type,
            strategy,
            classification,
            sub_problems,
            constraints,
            answer_format: AnswerFormat::detect(&problem.text),
            unit,
        }
    }
}
