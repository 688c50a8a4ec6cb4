//! Decomposition templates, one per problem type.

use crate::classifier::ProblemType;
use crate::tools::Capability;

/// One row of a decomposition template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateStep {
    pub description: &'static str,
    pub capability: Option<TemplateCapability>,
    /// Index of an earlier row whose result this row builds on.
    pub depends_on: Option<usize>,
}

/// Built-in capabilities a template may suggest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateCapability {
    Arithmetic,
    SymbolicEquation,
    SequencePredict,
    Geometry,
    ScheduleOptimize,
}

impl From<TemplateCapability> for Capability {
    fn from(cap: TemplateCapability) -> Self {
        match cap {
            TemplateCapability::Arithmetic => Self::Arithmetic,
            TemplateCapability::SymbolicEquation => Self::SymbolicEquation,
            TemplateCapability::SequencePredict => Self::SequencePredict,
            TemplateCapability::Geometry => Self::Geometry,
            TemplateCapability::ScheduleOptimize => Self::ScheduleOptimize,
        }
    }
}

const fn step(
    description: &'static str,
    capability: Option<TemplateCapability>,
    depends_on: Option<usize>,
) -> TemplateStep {
    TemplateStep {
        description,
        capability,
        depends_on,
    }
}

use TemplateCapability as T;

/// Only "compute" and "sanity-check result" are served by the arithmetic
/// tool. "extract quantities" is narrative and "select operation" needs a
/// symbolic solver, so without a collaborator or that solver both steps stay
/// unresolved. The chain still answers from the arithmetic steps, but scores
/// 0.7 instead of 0.9 (two of four steps pass, two prerequisites broken).
const MATHEMATICAL: [TemplateStep; 4] = [
    step("extract quantities", None, None),
    step("select operation", Some(T::SymbolicEquation), Some(0)),
    step("compute", Some(T::Arithmetic), Some(0)),
    step("sanity-check result", Some(T::Arithmetic), Some(2)),
];

const SPATIAL: [TemplateStep; 4] = [
    step("identify the geometric structure", None, None),
    step("determine relevant dimensions", None, Some(0)),
    step("apply spatial formula", Some(T::Geometry), Some(1)),
    step("calculate the answer", Some(T::Geometry), Some(2)),
];

const SEQUENCE: [TemplateStep; 4] = [
    step("identify the given sequence", None, None),
    step("analyze differences or ratios", Some(T::SequencePredict), Some(0)),
    step("determine the pattern rule", None, Some(1)),
    step("apply the rule to find the next term", Some(T::SequencePredict), Some(2)),
];

const OPTIMIZATION: [TemplateStep; 4] = [
    step("identify constraints and objectives", None, None),
    step("enumerate candidate approaches", None, Some(0)),
    step("evaluate candidates", Some(T::ScheduleOptimize), Some(1)),
    step("select the optimal solution", Some(T::ScheduleOptimize), Some(2)),
];

const LOGICAL: [TemplateStep; 4] = [
    step("identify given facts and conditions", None, None),
    step("determine what must be shown", None, None),
    step("apply logical rules step by step", None, Some(0)),
    step("reach a conclusion", None, Some(2)),
];

const CREATIVE: [TemplateStep; 4] = [
    step("identify the literal interpretation", None, None),
    step("consider alternative meanings", None, Some(0)),
    step("apply creative thinking", None, Some(1)),
    step("find the unconventional solution", None, Some(2)),
];

/// Fallback plan when no template applies.
pub const GENERIC: [TemplateStep; 1] = [step("reason about the problem", None, None)];

/// Returns the template for a problem type.
#[must_use]
pub fn template_for(problem_type: ProblemType) -> &'static [TemplateStep] {
    match problem_type {
        ProblemType::Mathematical => &MATHEMATICAL,
        ProblemType::Spatial => &SPATIAL,
        ProblemType::Sequence => &SEQUENCE,
        ProblemType::Optimization => &OPTIMIZATION,
        ProblemType::Logical => &LOGICAL,
        ProblemType::LateralThinking | ProblemType::ClassicRiddle => &CREATIVE,
    }
}
