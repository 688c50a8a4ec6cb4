//! Constraint extraction.
//!
//! Scanning only: numbers, measurement words, comparison phrases, explicit
//! bounds and percentages. No parsing of sentence structure.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::text::{contains_phrase, format_number, normalize};

/// Direction of an explicit bound ("at least 3", "at most 10").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundKind {
    Minimum,
    Maximum,
}

/// A fact the planner pulled out of the problem text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "fact", rename_all = "snake_case")]
pub enum ConstraintFact {
    /// A number, with the unit that directly follows it, if any.
    Quantity {
        value: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unit: Option<String>,
    },
    /// A measurement word ("hours", "days").
    Measure { unit: String },
    /// A comparison phrase ("more than", "equal to").
    Comparison { phrase: String },
    /// "at least N" / "at most N".
    Bound { kind: BoundKind, value: f64 },
    /// "N%" or "N percent".
    Percentage { value: f64 },
}

impl ConstraintFact {
    /// Strings whose presence in a step's thought or result counts as the
    /// fact being referenced.
    #[must_use]
    pub fn search_terms(&self) -> Vec<String> {
        match self {
            Self::Quantity { value, .. } | Self::Bound { value, .. } | Self::Percentage { value } => {
                vec![format_number(*value)]
            }
            Self::Measure { unit } => {
                let singular = unit.strip_suffix('s').unwrap_or(unit).to_string();
                if singular == *unit {
                    vec![unit.clone()]
                } else {
                    vec![unit.clone(), singular]
                }
            }
            Self::Comparison { phrase } => vec![phrase.clone()],
        }
    }

    /// Returns true if any search term occurs in `haystack` (already normalized).
    #[must_use]
    pub fn is_referenced_in(&self, haystack: &str) -> bool {
        self.search_terms().iter().any(|p| contains_phrase(haystack, &normalize(p)))
    }
}

impl fmt::Display for ConstraintFact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quantity { value, unit: Some(unit) } => write!(f, "{} {unit}", format_number(*value)),
            Self::Quantity { value, unit: None } => f.write_str(&format_number(*value)),
            Self::Measure { unit } => write!(f, "unit {unit}"),
            Self::Comparison { phrase } => write!(f, "'{phrase}'"),
            Self::Bound { kind: BoundKind::Minimum, value } => write!(f, "at least {}", format_number(*value)),
            Self::Bound { kind: BoundKind::Maximum, value } => write!(f, "at most {}", format_number(*value)),
            Self::Percentage { value } => write!(f, "{}%", format_number(*value)),
        }
    }
}

const UNITS: [&str; 28] = [
    "seconds", "second", "minutes", "minute", "hours", "hour", "days", "day", "weeks", "week", "months",
    "month", "years", "year", "meters", "meter", "km", "cm", "kg", "grams", "liters", "liter", "miles",
    "mile", "coins", "coin", "pieces", "presses",
];

const COMPARISONS: [&str; 12] = [
    "more than",
    "less than",
    "fewer than",
    "greater than",
    "equal to",
    "same as",
    "twice as",
    "half as",
    "at least",
    "at most",
    "exactly",
    "no more than",
];

static QUANTITY_RE: OnceLock<Regex> = OnceLock::new();
static BOUND_RE: OnceLock<Regex> = OnceLock::new();
static PERCENT_RE: OnceLock<Regex> = OnceLock::new();

fn quantity_re() -> &'static Regex {
    QUANTITY_RE.get_or_init(|| {
        Regex::new(r"(?i)(-?\d+(?:\.\d+)?)(?:\s*([a-z]+))?").expect("quantity regex is valid")
    })
}

fn bound_re() -> &'static Regex {
    BOUND_RE.get_or_init(|| {
        Regex::new(r"(?i)\b(at least|at most|no more than|no less than)\s+(-?\d+(?:\.\d+)?)")
            .expect("bound regex is valid")
    })
}

fn percent_re() -> &'static Regex {
    PERCENT_RE.get_or_init(|| {
        Regex::new(r"(?i)(-?\d+(?:\.\d+)?)\s*(?:%|percent\b)").expect("percent regex is valid")
    })
}

fn push_unique(facts: &mut Vec<ConstraintFact>, fact: ConstraintFact) {
    if !facts.contains(&fact) {
        facts.push(fact);
    }
}

/// Extract constraint facts from problem text, in order of first appearance
/// within each category.
#[must_use]
pub fn extract_constraints(text: &str) -> Vec<ConstraintFact> {
    let mut facts = Vec::new();

    for caps in quantity_re().captures_iter(text) {
        let Some(value) = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok()) else {
            continue;
        };
        let unit = caps
            .get(2)
            .map(|m| m.as_str().to_lowercase())
            .filter(|u| UNITS.contains(&u.as_str()));
        push_unique(&mut facts, ConstraintFact::Quantity { value, unit });
    }

    let normalized = normalize(text);
    for unit in UNITS {
        if contains_phrase(&normalized, unit) {
            // Prefer the plural spelling when both occur.
            let plural = format!("{unit}s");
            if UNITS.contains(&plural.as_str()) && contains_phrase(&normalized, &plural) {
                continue;
            }
            push_unique(&mut facts, ConstraintFact::Measure { unit: unit.to_string() });
        }
    }

    for phrase in COMPARISONS {
        if contains_phrase(&normalized, phrase) {
            push_unique(&mut facts, ConstraintFact::Comparison { phrase: phrase.to_string() });
        }
    }

    for caps in bound_re().captures_iter(text) {
        let Some(value) = caps.get(2).and_then(|m| m.as_str().parse::<f64>().ok()) else {
            continue;
        };
        let kind = match caps.get(1).map(|m| m.as_str().to_lowercase()).as_deref() {
            Some("at least" | "no less than") => BoundKind::Minimum,
            _ => BoundKind::Maximum,
        };
        push_unique(&mut facts, ConstraintFact::Bound { kind, value });
    }

    for caps in percent_re().captures_iter(text) {
        if let Some(value) = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok()) {
            push_unique(&mut facts, ConstraintFact::Percentage { value });
        }
    }

    facts
}

/// Most frequent unit attached to a quantity; ties go to the first seen.
#[must_use]
pub fn dominant_unit(facts: &[ConstraintFact]) -> Option<String> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for fact in facts {
        if let ConstraintFact::Quantity { unit: Some(unit), .. } = fact {
            match counts.iter_mut().find(|(u, _)| *u == unit.as_str()) {
                Some((_, n)) => *n += 1,
                None => counts.push((unit.as_str(), 1)),
            }
        }
    }
    let mut best: Option<(&str, usize)> = None;
    for (unit, n) in counts {
        if best.map_or(true, |(_, b)| n > b) {
            best = Some((unit, n));
        }
    }
    best.map(|(unit, _)| unit.to_string())
}
