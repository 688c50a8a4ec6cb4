//! Answer-to-option matching.
//!
//! Match order: exact (normalized, keeping signs and fraction slashes),
//! numeric equivalence, substring
//! containment, catch-all sentinel, then the most lexically similar option
//! as a weak match. With a non-empty option list the selected answer is
//! always one of the options.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::confidence::Confidence;
use crate::text::{contains_phrase, leading_number, normalize_answer, similarity, tokens};

/// Selector configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Relative tolerance for numeric equivalence.
    pub numeric_tolerance: f64,
    /// Confidence ceiling when the sentinel option is chosen.
    pub sentinel_ceiling: f64,
    /// Confidence multiplier for a weak (similarity-only) match.
    pub weak_penalty: f64,
    /// Option labels treated as the catch-all sentinel (compared normalized).
    pub sentinel_labels: Vec<String>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            numeric_tolerance: 1e-6,
            sentinel_ceiling: 0.5,
            weak_penalty: 0.7,
            sentinel_labels: vec!["another answer".to_string(), "none of the above".to_string()],
        }
    }
}

/// How the answer was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// No options were given; the answer is returned as is.
    Verbatim,
    Exact,
    Numeric,
    Substring,
    /// Nothing matched; the catch-all option was chosen.
    Sentinel,
    /// Nothing matched; the most similar option was chosen.
    Weak,
    /// Every option was blank.
    Malformed,
}

impl MatchKind {
    /// Returns true for exact, numeric and substring matches.
    #[must_use]
    pub const fn is_confident(self) -> bool {
        matches!(self, Self::Exact | Self::Numeric | Self::Substring)
    }
}

/// Selector output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// The answer to report.
    pub answer: String,
    /// The option chosen, if any.
    pub matched_option: Option<String>,
    pub kind: MatchKind,
}

/// Matches free-form answers against option lists.
#[derive(Debug, Clone)]
pub struct AnswerSelector {
    config: SelectorConfig,
    sentinels: Vec<String>,
}

impl Default for AnswerSelector {
    fn default() -> Self {
        Self::new(SelectorConfig::default())
    }
}

impl AnswerSelector {
    /// Creates a selector.
    #[must_use]
    pub fn new(config: SelectorConfig) -> Self {
        let sentinels = config.sentinel_labels.iter().map(|s| normalize_answer(s)).collect();
        Self { config, sentinels }
    }

    fn is_sentinel(&self, normalized: &str) -> bool {
        self.sentinels.iter().any(|s| s == normalized)
    }

    /// Select an option for `answer`.
    #[must_use]
    pub fn select(&self, answer: &str, options: &[String]) -> Selection {
        if options.is_empty() {
            return Selection {
                answer: answer.to_string(),
                matched_option: None,
                kind: MatchKind::Verbatim,
            };
        }

        let candidates: Vec<(&String, String)> = options
            .iter()
            .map(|o| (o, normalize_answer(o)))
            .filter(|(_, n)| !n.is_empty())
            .collect();
        if candidates.is_empty() {
            debug!(options = options.len(), "all options blank");
            return Selection {
                answer: answer.to_string(),
                matched_option: None,
                kind: MatchKind::Malformed,
            };
        }

        let selection = self.match_option(&normalize_answer(answer), answer, &candidates);
        debug!(kind = ?selection.kind, answer = %selection.answer, "selected option");
        selection
    }

    fn match_option(&self, norm: &str, raw: &str, candidates: &[(&String, String)]) -> Selection {
        if !norm.is_empty() {
            if let Some((option, _)) = candidates.iter().find(|(_, n)| n == norm) {
                return pick(option, MatchKind::Exact);
            }
        }

        if let Some(value) = leading_number(raw) {
            let unit = unit_of(norm);
            let found = candidates.iter().find(|(option, n)| {
                leading_number(option).is_some_and(|v| self.numbers_match(value, v))
                    && units_compatible(unit.as_deref(), unit_of(n).as_deref())
            });
            if let Some((option, _)) = found {
                return pick(option, MatchKind::Numeric);
            }
        }

        if !norm.is_empty() {
            let found = candidates
                .iter()
                .filter(|(_, n)| !self.is_sentinel(n))
                .filter(|(_, n)| contains_phrase(norm, n) || contains_phrase(n, norm))
                .fold(None::<&(&String, String)>, |best, c| match best {
                    Some(b) if b.1.len() >= c.1.len() => Some(b),
                    _ => Some(c),
                });
            if let Some((option, _)) = found {
                return pick(option, MatchKind::Substring);
            }
        }

        if let Some((option, _)) = candidates.iter().find(|(_, n)| self.is_sentinel(n)) {
            return pick(option, MatchKind::Sentinel);
        }

        // Highest similarity; the earliest option wins ties.
        let mut best = &candidates[0];
        let mut best_score = similarity(raw, best.0);
        for c in &candidates[1..] {
            let s = similarity(raw, c.0);
            if s > best_score {
                best = c;
                best_score = s;
            }
        }
        pick(best.0, MatchKind::Weak)
    }

    fn numbers_match(&self, a: f64, b: f64) -> bool {
        let scale = a.abs().max(b.abs()).max(1.0);
        (a - b).abs() <= self.config.numeric_tolerance * scale
    }

    /// Adjust a confidence for the kind of match.
    #[must_use]
    pub fn adjust(&self, kind: MatchKind, confidence: Confidence) -> Confidence {
        match kind {
            MatchKind::Verbatim | MatchKind::Exact | MatchKind::Numeric | MatchKind::Substring => confidence,
            MatchKind::Sentinel => confidence.min(Confidence::clamped(self.config.sentinel_ceiling)),
            MatchKind::Weak => confidence.scale(self.config.weak_penalty),
            MatchKind::Malformed => Confidence::ZERO,
        }
    }
}

fn pick(option: &str, kind: MatchKind) -> Selection {
    Selection {
        answer: option.to_string(),
        matched_option: Some(option.to_string()),
        kind,
    }
}

/// First alphabetic token after the leading number, singularized.
fn unit_of(normalized: &str) -> Option<String> {
    tokens(normalized)
        .skip_while(|t| !t.chars().any(|c| c.is_ascii_digit()) && leading_number(t).is_none())
        .skip(1)
        .find(|t| t.chars().all(char::is_alphabetic))
        .map(|t| t.strip_suffix('s').map_or_else(|| t.clone(), str::to_string))
}

fn units_compatible(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn no_options_returns_answer_verbatim() {
        let s = AnswerSelector::default().select("2 hours", &[]);
        assert_eq!(s.kind, MatchKind::Verbatim);
        assert_eq!(s.answer, "2 hours");
    }

    #[test]
    fn exact_match_ignores_case_and_punctuation() {
        let s = AnswerSelector::default().select("second.", &opts(&["First", "Second", "Third"]));
        assert_eq!(s.kind, MatchKind::Exact);
        assert_eq!(s.answer, "Second");
    }

    #[test]
    fn numeric_match_within_tolerance() {
        let s = AnswerSelector::default().select("2.0000001 hours", &opts(&["1 hour", "2 hours", "3 hours"]));
        assert_eq!(s.kind, MatchKind::Numeric);
        assert_eq!(s.answer, "2 hours");
    }

    #[test]
    fn numeric_match_rejects_other_units() {
        let s = AnswerSelector::default().select("2.0 days", &opts(&["2 hours", "Another answer"]));
        assert_eq!(s.kind, MatchKind::Sentinel);
        assert_eq!(s.answer, "Another answer");
    }

    #[test]
    fn sign_distinguishes_options() {
        let options = opts(&["3 degrees", "-3 degrees"]);
        let s = AnswerSelector::default().select("-3 degrees", &options);
        assert_eq!(s.kind, MatchKind::Exact);
        assert_eq!(s.answer, "-3 degrees");

        let s = AnswerSelector::default().select("-3.0 degrees", &options);
        assert_eq!(s.kind, MatchKind::Numeric);
        assert_eq!(s.answer, "-3 degrees");

        let s = AnswerSelector::default().select("3 degrees", &options);
        assert_eq!(s.answer, "3 degrees");
    }

    #[test]
    fn fractions_compare_by_value() {
        let options = opts(&["1 hour", "1/2 hour", "2 hours"]);
        let s = AnswerSelector::default().select("1/2 hour", &options);
        assert_eq!(s.kind, MatchKind::Exact);
        assert_eq!(s.answer, "1/2 hour");

        let s = AnswerSelector::default().select("0.5 hours", &options);
        assert_eq!(s.kind, MatchKind::Numeric);
        assert_eq!(s.answer, "1/2 hour");
    }

    #[test]
    fn word_numbers_match_digits() {
        let s = AnswerSelector::default().select("six presses", &opts(&["4", "5", "6", "7"]));
        assert_eq!(s.kind, MatchKind::Numeric);
        assert_eq!(s.answer, "6");
    }

    #[test]
    fn substring_prefers_longest_option() {
        let s = AnswerSelector::default().select(
            "the answer is the red door on the left",
            &opts(&["door", "red door", "blue door"]),
        );
        assert_eq!(s.kind, MatchKind::Substring);
        assert_eq!(s.answer, "red door");
    }

    #[test]
    fn sentinel_caps_confidence() {
        let selector = AnswerSelector::default();
        let s = selector.select("a banana", &opts(&["First", "Second", "Another answer"]));
        assert_eq!(s.kind, MatchKind::Sentinel);
        assert_eq!(selector.adjust(s.kind, Confidence::clamped(0.9)).value(), 0.5);
    }

    #[test]
    fn weak_match_is_penalized() {
        let selector = AnswerSelector::default();
        let s = selector.select("green apple pie", &opts(&["red apple", "blue sky"]));
        assert_eq!(s.kind, MatchKind::Weak);
        assert_eq!(s.answer, "red apple");
        assert!((selector.adjust(s.kind, Confidence::ONE).value() - 0.7).abs() < 1e-9);
    }

    #[test]
    fn blank_options_are_malformed() {
        let selector = AnswerSelector::default();
        let s = selector.select("Second", &opts(&["", "  ", "?"]));
        assert_eq!(s.kind, MatchKind::Malformed);
        assert!(s.matched_option.is_none());
        assert_eq!(selector.adjust(s.kind, Confidence::ONE), Confidence::ZERO);
    }
}
