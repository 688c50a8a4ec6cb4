//! Problem classification.
//!
//! The classifier maps (text, topic) to a `ProblemType`. The topic hint wins
//! when it names a known type; otherwise keywords in the text are counted per
//! type. Ties are broken by `ProblemType::PRIORITY`, so classification is a
//! pure function of its inputs and the `KeywordTable`.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::confidence::Confidence;
use crate::text::{contains_phrase, normalize};

/// Fixed set of puzzle families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemType {
    Mathematical,
    Spatial,
    Logical,
    Sequence,
    Optimization,
    LateralThinking,
    ClassicRiddle,
}

impl ProblemType {
    /// Tie-break order, highest priority first.
    pub const PRIORITY: [Self; 7] = [
        Self::Mathematical,
        Self::Spatial,
        Self::Optimization,
        Self::Sequence,
        Self::Logical,
        Self::LateralThinking,
        Self::ClassicRiddle,
    ];

    /// Returns a short stable identifier.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Mathematical => "mathematical",
            Self::Spatial => "spatial",
            Self::Logical => "logical",
            Self::Sequence => "sequence",
            Self::Optimization => "optimization",
            Self::LateralThinking => "lateral_thinking",
            Self::ClassicRiddle => "classic_riddle",
        }
    }

    fn rank(self) -> usize {
        Self::PRIORITY
            .iter()
            .position(|t| *t == self)
            .unwrap_or(Self::PRIORITY.len())
    }
}

impl fmt::Display for ProblemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Topic aliases and text keywords for one problem type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeKeywords {
    /// The type these entries vote for.
    pub problem_type: ProblemType,
    /// Topic strings that name this type ("Classic riddles").
    #[serde(default)]
    pub topics: Vec<String>,
    /// Words or phrases that suggest this type in problem text.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl TypeKeywords {
    fn new(problem_type: ProblemType, topics: &[&str], keywords: &[&str]) -> Self {
        Self {
            problem_type,
            topics: topics.iter().map(|s| normalize(s)).collect(),
            keywords: keywords.iter().map(|s| normalize(s)).collect(),
        }
    }
}

/// Immutable keyword configuration handed to the classifier at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeywordTable {
    entries: Vec<TypeKeywords>,
}

impl KeywordTable {
    /// Creates a table from explicit entries. Topics and keywords are
    /// normalized on the way in.
    #[must_use]
    pub fn new(entries: Vec<TypeKeywords>) -> Self {
        let entries = entries
            .into_iter()
            .map(|e| TypeKeywords {
                problem_type: e.problem_type,
                topics: e.topics.iter().map(|s| normalize(s)).collect(),
                keywords: e.keywords.iter().map(|s| normalize(s)).collect(),
            })
            .collect();
        Self { entries }
    }

    /// Returns the entries in table order.
    #[must_use]
    pub fn entries(&self) -> &[TypeKeywords] {
        &self.entries
    }
}

impl Default for KeywordTable {
    fn default() -> Self {
        Self {
            entries: vec![
                TypeKeywords::new(
                    ProblemType::Mathematical,
                    &["mathematical", "mathematics", "math", "arithmetic", "word problems"],
                    &[
                        "calculate", "equation", "sum", "multiply", "divide", "percentage", "ratio",
                        "average", "total", "machines", "together", "rate", "how long", "how much",
                    ],
                ),
                TypeKeywords::new(
                    ProblemType::Spatial,
                    &["spatial", "spatial reasoning", "geometry"],
                    &[
                        "cube", "3d", "surface", "volume", "faces", "edges", "corner", "diagonal",
                        "geometry", "shape", "rotate", "painted", "grid",
                    ],
                ),
                TypeKeywords::new(
                    ProblemType::Logical,
                    &["logical", "logic", "logic puzzles", "operation of mechanisms"],
                    &[
                        "if", "then", "true", "false", "statement", "consistent", "contradiction",
                        "must be", "cannot be", "machine", "button", "liar",
                    ],
                ),
                TypeKeywords::new(
                    ProblemType::Sequence,
                    &["sequence", "sequences", "sequence solving", "patterns"],
                    &[
                        "sequence", "pattern", "next number", "series", "follows", "continue",
                        "missing", "dots", "next term",
                    ],
                ),
                TypeKeywords::new(
                    ProblemType::Optimization,
                    &["optimization", "optimization of actions and planning", "planning", "scheduling"],
                    &[
                        "minimize", "maximize", "optimal", "best", "schedule", "efficiency",
                        "shortest", "longest", "most", "least", "planning", "days", "hours", "tasks",
                    ],
                ),
                TypeKeywords::new(
                    ProblemType::LateralThinking,
                    &["lateral thinking", "lateral"],
                    &[
                        "how can", "possible", "unexpected", "strange", "shoots", "underwater",
                        "hangs", "dies", "survived",
                    ],
                ),
                TypeKeywords::new(
                    ProblemType::ClassicRiddle,
                    &["classic riddles", "classic riddle", "riddles", "riddle"],
                    &[
                        "riddle", "what am i", "puzzle", "classic", "race", "overtake", "position",
                        "gold coins",
                    ],
                ),
            ],
        }
    }
}

/// How a classification was reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "basis", rename_all = "snake_case")]
pub enum ClassificationBasis {
    /// The topic hint named a known type.
    Topic {
        /// The alias that matched.
        alias: String,
    },
    /// Keyword counting over the problem text.
    Keywords {
        /// Keywords that voted for the winning type.
        matched: Vec<String>,
    },
    /// Nothing matched; the default type was used.
    Default,
}

/// Classifier output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub problem_type: ProblemType,
    pub confidence: Confidence,
    pub basis: ClassificationBasis,
    /// Set when nothing matched or the top keyword score was tied.
    pub ambiguous: bool,
}

/// Maps raw problem text plus an optional topic to a `ProblemType`.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    table: KeywordTable,
}

impl Classifier {
    /// Type used when nothing matches.
    pub const DEFAULT_TYPE: ProblemType = ProblemType::Logical;

    const TOPIC_CONFIDENCE: f64 = 0.95;
    const DEFAULT_CONFIDENCE: f64 = 0.2;
    const TIE_PENALTY: f64 = 0.15;

    /// Creates a classifier over the given table.
    #[must_use]
    pub fn new(table: KeywordTable) -> Self {
        Self { table }
    }

    /// Returns the keyword table.
    #[must_use]
    pub fn table(&self) -> &KeywordTable {
        &self.table
    }

    /// Classify a problem.
    #[must_use]
    pub fn classify(&self, text: &str, topic: Option<&str>) -> Classification {
        let classification = topic
            .and_then(|t| self.classify_topic(t))
            .unwrap_or_else(|| self.classify_text(text));
        debug!(
            problem_type = %classification.problem_type,
            confidence = classification.confidence.value(),
            ambiguous = classification.ambiguous,
            "classified problem"
        );
        classification
    }

    fn classify_topic(&self, topic: &str) -> Option<Classification> {
        let topic = normalize(topic);
        if topic.is_empty() {
            return None;
        }

        // Exact alias first, then the longest alias contained in the topic.
        let mut best: Option<(bool, usize, usize, ProblemType, &str)> = None;
        for entry in &self.table.entries {
            for alias in &entry.topics {
                let exact = *alias == topic;
                if !exact && !contains_phrase(&topic, alias) {
                    continue;
                }
                let candidate = (exact, alias.len(), entry.problem_type.rank(), entry.problem_type, alias.as_str());
                let better = match &best {
                    None => true,
                    Some((b_exact, b_len, b_rank, _, _)) => {
                        (exact, alias.len(), std::cmp::Reverse(candidate.2))
                            > (*b_exact, *b_len, std::cmp::Reverse(*b_rank))
                    }
                };
                if better {
                    best = Some(candidate);
                }
            }
        }

        best.map(|(_, _, _, problem_type, alias)| Classification {
            problem_type,
            confidence: Confidence::clamped(Self::TOPIC_CONFIDENCE),
            basis: ClassificationBasis::Topic {
                alias: alias.to_string(),
            },
            ambiguous: false,
        })
    }

    fn classify_text(&self, text: &str) -> Classification {
        let text = normalize(text);

        let mut scores: Vec<(ProblemType, Vec<String>)> = Vec::with_capacity(self.table.entries.len());
        for entry in &self.table.entries {
            let matched: BTreeSet<&str> = entry
                .keywords
                .iter()
                .filter(|k| contains_phrase(&text, k))
                .map(String::as_str)
                .collect();
            match scores.iter_mut().find(|(t, _)| *t == entry.problem_type) {
                Some((_, existing)) => {
                    existing.extend(matched.into_iter().map(str::to_string));
                    existing.sort();
                    existing.dedup();
                }
                None => scores.push((entry.problem_type, matched.into_iter().map(str::to_string).collect())),
            }
        }

        scores.sort_by(|(ta, ma), (tb, mb)| mb.len().cmp(&ma.len()).then(ta.rank().cmp(&tb.rank())));

        let Some((winner, matched)) = scores.first().filter(|(_, m)| !m.is_empty()) else {
            return Classification {
                problem_type: Self::DEFAULT_TYPE,
                confidence: Confidence::clamped(Self::DEFAULT_CONFIDENCE),
                basis: ClassificationBasis::Default,
                ambiguous: true,
            };
        };

        let tied = scores.get(1).is_some_and(|(_, m)| m.len() == matched.len());
        #[allow(clippy::cast_precision_loss)]
        let mut confidence = (0.5 + 0.1 * matched.len() as f64).min(0.9);
        if tied {
            confidence -= Self::TIE_PENALTY;
        }

        Classification {
            problem_type: *winner,
            confidence: Confidence::clamped(confidence),
            basis: ClassificationBasis::Keywords {
                matched: matched.clone(),
            },
            ambiguous: tied,
        }
    }
}
