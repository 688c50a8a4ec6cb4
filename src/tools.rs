//! Tool registry boundary.
//!
//! Deterministic solvers live outside this crate. The core only knows a
//! capability name, the payload it hands over, and the success/failure
//! contract of the reply. New capabilities are added by registering an
//! implementation; the executor's control flow never changes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ToolFailure, ValidationError};
use crate::plan::ConstraintFact;

/// Stable capability identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Capability {
    Arithmetic,
    SymbolicEquation,
    SequencePredict,
    Geometry,
    ScheduleOptimize,
    /// Any capability registered under a name the core does not know.
    Custom(String),
}

impl Capability {
    /// Returns the wire name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Arithmetic => "arithmetic",
            Self::SymbolicEquation => "symbolic-equation",
            Self::SequencePredict => "sequence-predict",
            Self::Geometry => "geometry",
            Self::ScheduleOptimize => "schedule-optimize",
            Self::Custom(name) => name,
        }
    }

    /// Value kinds a well-behaved tool of this capability returns.
    /// `None` means any kind is acceptable.
    #[must_use]
    pub fn expected_kinds(&self) -> Option<&'static [ValueKind]> {
        match self {
            Self::Arithmetic | Self::Geometry => Some(&[ValueKind::Number]),
            Self::SymbolicEquation => Some(&[ValueKind::Number, ValueKind::Text]),
            Self::SequencePredict => Some(&[ValueKind::Number, ValueKind::Sequence]),
            Self::ScheduleOptimize => Some(&[ValueKind::Number, ValueKind::Text]),
            Self::Custom(_) => None,
        }
    }
}

impl From<String> for Capability {
    fn from(name: String) -> Self {
        match name.as_str() {
            "arithmetic" => Self::Arithmetic,
            "symbolic-equation" => Self::SymbolicEquation,
            "sequence-predict" => Self::SequencePredict,
            "geometry" => Self::Geometry,
            "schedule-optimize" => Self::ScheduleOptimize,
            _ => Self::Custom(name),
        }
    }
}

impl From<Capability> for String {
    fn from(cap: Capability) -> Self {
        cap.as_str().to_string()
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discriminant of a `ToolValue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Number,
    Text,
    Sequence,
    Flag,
}

/// Raw value produced by a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ToolValue {
    Number(f64),
    Text(String),
    Sequence(Vec<f64>),
    Flag(bool),
}

impl ToolValue {
    /// Text a tool returns when it ran but cannot commit to an answer.
    pub const UNCERTAIN_MARKER: &'static str = "uncertain";

    /// Returns the value kind.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Number(_) => ValueKind::Number,
            Self::Text(_) => ValueKind::Text,
            Self::Sequence(_) => ValueKind::Sequence,
            Self::Flag(_) => ValueKind::Flag,
        }
    }

    /// Returns false if any numeric component is NaN or infinite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Number(n) => n.is_finite(),
            Self::Sequence(values) => values.iter().all(|v| v.is_finite()),
            Self::Text(_) | Self::Flag(_) => true,
        }
    }

    /// Returns true for the designated "uncertain" marker.
    #[must_use]
    pub fn is_uncertain(&self) -> bool {
        matches!(self, Self::Text(t) if t.trim().eq_ignore_ascii_case(Self::UNCERTAIN_MARKER))
    }
}

impl fmt::Display for ToolValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => f.write_str(&crate::text::format_number(*n)),
            Self::Text(t) => f.write_str(t),
            Self::Sequence(values) => {
                let parts: Vec<String> = values.iter().map(|v| crate::text::format_number(*v)).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Self::Flag(b) => write!(f, "{b}"),
        }
    }
}

/// A tool's successful reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolReport {
    pub value: ToolValue,
    /// Tool-reported certainty in [0, 1]. Absent means fully certain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certainty: Option<f64>,
}

impl ToolReport {
    /// A report without an explicit certainty.
    #[must_use]
    pub const fn new(value: ToolValue) -> Self {
        Self { value, certainty: None }
    }

    /// Attach a certainty.
    #[must_use]
    pub const fn with_certainty(mut self, certainty: f64) -> Self {
        self.certainty = Some(certainty);
        self
    }
}

/// Input handed to a tool for one sub-problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolPayload {
    pub problem_text: String,
    pub sub_problem: String,
    /// Every decimal literal in the problem, in order.
    pub numbers: Vec<f64>,
    pub constraints: Vec<ConstraintFact>,
    /// Results of the steps completed so far.
    pub prior_results: Vec<String>,
    pub options: Vec<String>,
}

/// A single deterministic capability implementation.
pub trait Tool: Send + Sync {
    /// Capability served by this tool.
    fn capability(&self) -> Capability;

    /// Run the tool.
    ///
    /// # Errors
    ///
    /// Returns a `ToolFailure` on bad input or numeric trouble.
    fn invoke(&self, payload: &ToolPayload) -> Result<ToolReport, ToolFailure>;
}

/// Capability lookup and dispatch.
pub trait ToolRegistry: Send + Sync {
    /// Returns true if the capability can be invoked.
    fn has(&self, capability: &Capability) -> bool;

    /// Invoke a capability by name.
    ///
    /// # Errors
    ///
    /// Returns `ToolFailure::Unavailable` for unknown capabilities or the
    /// tool's own failure.
    fn invoke(&self, capability: &Capability, payload: &ToolPayload) -> Result<ToolReport, ToolFailure>;

    /// Registered capabilities in stable order.
    fn capabilities(&self) -> Vec<Capability>;
}

/// Adapts a closure into a `Tool`.
pub struct FnTool<F> {
    capability: Capability,
    func: F,
}

impl<F> FnTool<F>
where
    F: Fn(&ToolPayload) -> Result<ToolReport, ToolFailure> + Send + Sync,
{
    /// Wrap a closure.
    pub fn new(capability: Capability, func: F) -> Self {
        Self { capability, func }
    }
}

impl<F> Tool for FnTool<F>
where
    F: Fn(&ToolPayload) -> Result<ToolReport, ToolFailure> + Send + Sync,
{
    fn capability(&self) -> Capability {
        self.capability.clone()
    }

    fn invoke(&self, payload: &ToolPayload) -> Result<ToolReport, ToolFailure> {
        (self.func)(payload)
    }
}

/// In-memory registry mapping capability names to implementations.
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    tools: BTreeMap<Capability, Arc<dyn Tool>>,
}

impl CapabilityRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its capability.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::DuplicateCapability` if the name is taken.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ValidationError> {
        let capability = tool.capability();
        if self.tools.contains_key(&capability) {
            return Err(ValidationError::DuplicateCapability {
                name: capability.to_string(),
            });
        }
        self.tools.insert(capability, tool);
        Ok(())
    }

    /// Register a closure.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::DuplicateCapability` if the name is taken.
    pub fn register_fn<F>(&mut self, capability: Capability, func: F) -> Result<(), ValidationError>
    where
        F: Fn(&ToolPayload) -> Result<ToolReport, ToolFailure> + Send + Sync + 'static,
    {
        self.register(Arc::new(FnTool::new(capability, func)))
    }

    /// Builder-style registration.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::DuplicateCapability` if the name is taken.
    pub fn with_fn<F>(mut self, capability: Capability, func: F) -> Result<Self, ValidationError>
    where
        F: Fn(&ToolPayload) -> Result<ToolReport, ToolFailure> + Send + Sync + 'static,
    {
        self.register_fn(capability, func)?;
        Ok(self)
    }
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("capabilities", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolRegistry for CapabilityRegistry {
    fn has(&self, capability: &Capability) -> bool {
        self.tools.contains_key(capability)
    }

    fn invoke(&self, capability: &Capability, payload: &ToolPayload) -> Result<ToolReport, ToolFailure> {
        let tool = self.tools.get(capability).ok_or_else(|| ToolFailure::Unavailable {
            capability: capability.clone(),
        })?;
        tool.invoke(payload)
    }

    fn capabilities(&self) -> Vec<Capability> {
        self.tools.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> ToolPayload {
        ToolPayload {
            problem_text: "1 + 2".to_string(),
            sub_problem: "compute".to_string(),
            numbers: vec![1.0, 2.0],
            constraints: Vec::new(),
            prior_results: Vec::new(),
            options: Vec::new(),
        }
    }

    #[test]
    fn capability_names_round_trip() {
        for cap in [
            Capability::Arithmetic,
            Capability::SymbolicEquation,
            Capability::SequencePredict,
            Capability::Geometry,
            Capability::ScheduleOptimize,
            Capability::Custom("dice".to_string()),
        ] {
            assert_eq!(Capability::from(cap.as_str().to_string()), cap);
        }
        let json = serde_json::to_string(&Capability::SymbolicEquation).unwrap();
        assert_eq!(json, "\"symbolic-equation\"");
    }

    #[test]
    fn registry_dispatches_by_capability() {
        let registry = CapabilityRegistry::new()
            .with_fn(Capability::Arithmetic, |p| {
                Ok(ToolReport::new(ToolValue::Number(p.numbers.iter().sum())))
            })
            .unwrap();
        assert!(registry.has(&Capability::Arithmetic));
        let report = registry.invoke(&Capability::Arithmetic, &payload()).unwrap();
        assert_eq!(report.value, ToolValue::Number(3.0));
    }

    #[test]
    fn unknown_capability_is_unavailable() {
        let registry = CapabilityRegistry::new();
        let err = registry.invoke(&Capability::Geometry, &payload()).unwrap_err();
        assert_eq!(
            err,
            ToolFailure::Unavailable {
                capability: Capability::Geometry
            }
        );
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = CapabilityRegistry::new();
        registry
            .register_fn(Capability::Geometry, |_| Ok(ToolReport::new(ToolValue::Flag(true))))
            .unwrap();
        let err = registry
            .register_fn(Capability::Geometry, |_| Ok(ToolReport::new(ToolValue::Flag(false))))
            .unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateCapability { .. }));
    }

    #[test]
    fn value_checks() {
        assert!(!ToolValue::Number(f64::NAN).is_finite());
        assert!(!ToolValue::Sequence(vec![1.0, f64::INFINITY]).is_finite());
        assert!(ToolValue::Text(" Uncertain ".to_string()).is_uncertain());
        assert_eq!(ToolValue::Sequence(vec![1.0, 2.5]).to_string(), "[1, 2.5]");
    }
}
