//! Problem input types.
//!
//! A `Problem` is immutable once built. Its `Fingerprint` is a blake3 digest
//! over the case- and whitespace-folded text, topic and options, so cosmetic
//! differences map to the same cache slot while operators and signs keep
//! problems apart. The `ProblemId`
//! is a name-based UUID derived from that fingerprint, which keeps ids stable
//! across runs.

use std::fmt;

use blake3::Hasher;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::text::fold;

/// Stable identifier for a problem, derived from its fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProblemId(Uuid);

impl ProblemId {
    fn from_fingerprint(fingerprint: &Fingerprint) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, fingerprint.as_bytes()))
    }
}

impl fmt::Display for ProblemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Normalized cache key over (text, topic, options).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Computes the fingerprint of a problem's inputs.
    #[must_use]
    pub fn compute(text: &str, topic: Option<&str>, options: &[String]) -> Self {
        let mut h = Hasher::new();
        // Length-prefix every field so ("ab", "c") and ("a", "bc") differ.
        let mut field = |bytes: &[u8]| {
            h.update(&(bytes.len() as u64).to_le_bytes());
            h.update(bytes);
        };
        field(fold(text).as_bytes());
        match topic {
            Some(t) => field(fold(t).as_bytes()),
            None => field(b"\0none"),
        }
        for opt in options {
            field(fold(opt).as_bytes());
        }
        Self(*h.finalize().as_bytes())
    }

    /// Returns the raw digest.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0[..8] {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// One multiple-choice puzzle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Problem {
    /// Stable identifier.
    pub id: ProblemId,
    /// Problem statement.
    pub text: String,
    /// Optional category hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Candidate answers in presentation order. May be empty.
    pub options: Vec<String>,
    #[serde(skip)]
    fingerprint: Fingerprint,
}

impl Problem {
    /// Maximum accepted problem text length (bytes).
    pub const MAX_TEXT_LEN: usize = 16 * 1024;

    /// Creates a problem with validation.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyProblemText` for blank text and
    /// `ValidationError::InvalidField` for oversized text.
    pub fn new(
        text: impl Into<String>,
        topic: Option<String>,
        options: Vec<String>,
    ) -> Result<Self, ValidationError> {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyProblemText);
        }
        if trimmed.len() > Self::MAX_TEXT_LEN {
            return Err(ValidationError::InvalidField {
                field: "text".to_string(),
                reason: format!("exceeds {} bytes", Self::MAX_TEXT_LEN),
            });
        }
        let topic = topic
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let text = trimmed.to_string();
        let fingerprint = Fingerprint::compute(&text, topic.as_deref(), &options);

        Ok(Self {
            id: ProblemId::from_fingerprint(&fingerprint),
            text,
            topic,
            options,
            fingerprint,
        })
    }

    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> ProblemBuilder {
        ProblemBuilder::default()
    }

    /// Returns the cache fingerprint.
    #[must_use]
    pub const fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// Returns true if the caller supplied answer options.
    #[must_use]
    pub fn has_options(&self) -> bool {
        !self.options.is_empty()
    }
}

/// Builder for `Problem`.
#[derive(Debug, Clone, Default)]
pub struct ProblemBuilder {
    text: Option<String>,
    topic: Option<String>,
    options: Vec<String>,
}

impl ProblemBuilder {
    /// Set the problem statement.
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Set the topic hint.
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Add one answer option.
    #[must_use]
    pub fn option(mut self, option: impl Into<String>) -> Self {
        self.options.push(option.into());
        self
    }

    /// Set all answer options.
    #[must_use]
    pub fn options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    /// Build the problem.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::MissingField` when no text was set, or any
    /// error from `Problem::new`.
    pub fn build(self) -> Result<Problem, ValidationError> {
        let text = self.text.ok_or_else(|| ValidationError::MissingField {
            field: "text".to_string(),
        })?;
        Problem::new(text, self.topic, self.options)
    }
}

/// Serializable batch input record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemSpec {
    /// Problem statement.
    #[serde(alias = "problem", alias = "problem_statement")]
    pub text: String,
    /// Optional category hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Candidate answers.
    #[serde(default)]
    pub options: Vec<String>,
}

impl ProblemSpec {
    /// Creates a batch record.
    #[must_use]
    pub fn new(text: impl Into<String>, topic: Option<&str>, options: &[&str]) -> Self {
        Self {
            text: text.into(),
            topic: topic.map(str::to_string),
            options: options.iter().map(|o| (*o).to_string()).collect(),
        }
    }
}

impl TryFrom<ProblemSpec> for Problem {
    type Error = ValidationError;

    fn try_from(spec: ProblemSpec) -> Result<Self, Self::Error> {
        Problem::new(spec.text, spec.topic, spec.options)
    }
}
