//! Engine configuration.
//!
//! Every component takes a plain config struct with a `Default` impl.
//! `EngineConfig` bundles them and can be loaded from a (possibly partial)
//! JSON document; missing fields keep their defaults.

use serde::{Deserialize, Serialize};

use crate::classifier::KeywordTable;
use crate::error::{SolveResult, ValidationError};
use crate::executor::ExecutorConfig;
use crate::plan::PlannerConfig;
use crate::runtime::BatchConfig;
use crate::selector::SelectorConfig;
use crate::verifier::VerifierConfig;

/// Configuration for a `SolveEngine` and its batch runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub keywords: KeywordTable,
    pub planner: PlannerConfig,
    pub executor: ExecutorConfig,
    pub verifier: VerifierConfig,
    pub selector: SelectorConfig,
    pub batch: BatchConfig,
}

fn unit_interval(field: &str, value: f64) -> Result<(), ValidationError> {
    if value.is_nan() || !(0.0..=1.0).contains(&value) {
        return Err(ValidationError::InvalidField {
            field: field.to_string(),
            reason: format!("{value} is not in [0.0, 1.0]"),
        });
    }
    Ok(())
}

fn positive(field: &str, value: usize) -> Result<(), ValidationError> {
    if value == 0 {
        return Err(ValidationError::InvalidField {
            field: field.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}

fn non_zero_timeout(field: &str, value: Option<u64>) -> Result<(), ValidationError> {
    if value == Some(0) {
        return Err(ValidationError::InvalidField {
            field: field.to_string(),
            reason: "a zero timeout can never succeed; use null to disable it".to_string(),
        });
    }
    Ok(())
}

impl EngineConfig {
    /// Parse and validate a JSON document.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidField` for malformed JSON or values
    /// out of range.
    pub fn from_json(json: &str) -> SolveResult<Self> {
        let mut config: Self = serde_json::from_str(json).map_err(|e| ValidationError::InvalidField {
            field: "config".to_string(),
            reason: e.to_string(),
        })?;
        config.keywords = KeywordTable::new(config.keywords.entries().to_vec());
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidField` naming the first bad field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        unit_interval("executor.fallback_confidence", self.executor.fallback_confidence)?;
        unit_interval("executor.uncertain_confidence", self.executor.uncertain_confidence)?;
        positive("executor.max_reply_chars", self.executor.max_reply_chars)?;
        non_zero_timeout("executor.tool_timeout_ms", self.executor.tool_timeout_ms)?;
        non_zero_timeout("executor.collaborator_timeout_ms", self.executor.collaborator_timeout_ms)?;

        unit_interval("verifier.validity_threshold", self.verifier.validity_threshold)?;

        unit_interval("selector.sentinel_ceiling", self.selector.sentinel_ceiling)?;
        unit_interval("selector.weak_penalty", self.selector.weak_penalty)?;
        if !self.selector.numeric_tolerance.is_finite() || self.selector.numeric_tolerance < 0.0 {
            return Err(ValidationError::InvalidField {
                field: "selector.numeric_tolerance".to_string(),
                reason: format!("{} is not a finite non-negative number", self.selector.numeric_tolerance),
            });
        }

        positive("batch.workers", self.batch.workers)?;
        positive("batch.queue_capacity", self.batch.queue_capacity)?;
        non_zero_timeout("batch.problem_budget_ms", self.batch.problem_budget_ms)?;
        Ok(())
    }
}
