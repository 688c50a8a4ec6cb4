//! Text normalization helpers shared by the classifier, planner and selector.
//!
//! Everything here is deterministic and allocation-light. Matching is ASCII
//! case-folded; non-alphanumeric characters act as separators.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

static NUMBER_RE: OnceLock<Regex> = OnceLock::new();
static QUANTITY_RE: OnceLock<Regex> = OnceLock::new();

fn number_re() -> &'static Regex {
    NUMBER_RE.get_or_init(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("number regex is valid"))
}

fn quantity_re() -> &'static Regex {
    QUANTITY_RE.get_or_init(|| {
        Regex::new(r"(-?\d+(?:\.\d+)?)(?:\s*/\s*(\d+(?:\.\d+)?))?").expect("quantity regex is valid")
    })
}

/// Characters that change what a value means and survive answer
/// normalization.
const VALUE_MARKS: [char; 6] = ['-', '+', '*', '/', '%', '='];

const WORD_NUMBERS: [(&str, f64); 21] = [
    ("zero", 0.0),
    ("one", 1.0),
    ("two", 2.0),
    ("three", 3.0),
    ("four", 4.0),
    ("five", 5.0),
    ("six", 6.0),
    ("seven", 7.0),
    ("eight", 8.0),
    ("nine", 9.0),
    ("ten", 10.0),
    ("eleven", 11.0),
    ("twelve", 12.0),
    ("thirteen", 13.0),
    ("fourteen", 14.0),
    ("fifteen", 15.0),
    ("sixteen", 16.0),
    ("seventeen", 17.0),
    ("eighteen", 18.0),
    ("nineteen", 19.0),
    ("twenty", 20.0),
];

/// Splits text into lowercase alphanumeric tokens.
pub fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric() && c != '.')
        .map(|t| t.trim_matches('.'))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

/// Case-folds, strips punctuation and collapses whitespace.
///
/// Decimal points between digits survive so "2.5 hours" stays comparable.
#[must_use]
pub fn normalize(text: &str) -> String {
    tokens(text).collect::<Vec<_>>().join(" ")
}

/// Like `normalize`, but keeps signs, operators, fraction slashes and
/// percent marks, so "-3" and "3" or "1/2" and "1 2" stay distinct.
#[must_use]
pub fn normalize_answer(text: &str) -> String {
    text.split(|c: char| !c.is_alphanumeric() && c != '.' && !VALUE_MARKS.contains(&c))
        .map(|t| t.trim_matches('.'))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Case-folds and collapses whitespace, dropping only trailing sentence
/// punctuation. Everything else is kept verbatim.
#[must_use]
pub fn fold(text: &str) -> String {
    let joined = text.split_whitespace().map(str::to_lowercase).collect::<Vec<_>>().join(" ");
    joined.trim_end_matches(&['.', '!', '?'][..]).trim_end().to_string()
}

/// Returns true if `phrase` (already normalized) occurs in `haystack`
/// (already normalized) on token boundaries.
#[must_use]
pub fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    if phrase.is_empty() || haystack.is_empty() {
        return false;
    }
    let padded = format!(" {haystack} ");
    padded.contains(&format!(" {phrase} "))
}

/// Extracts every decimal literal in order of appearance.
#[must_use]
pub fn numbers(text: &str) -> Vec<f64> {
    number_re()
        .find_iter(text)
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .collect()
}

/// Parses the leading quantity of an answer: the first decimal literal or
/// fraction, or failing that the first number word ("six presses" -> 6).
#[must_use]
pub fn leading_number(text: &str) -> Option<f64> {
    if let Some(caps) = quantity_re().captures(text) {
        let value = caps[1].parse::<f64>().ok()?;
        return match caps.get(2) {
            Some(den) => {
                let den = den.as_str().parse::<f64>().ok()?;
                (den != 0.0).then(|| value / den)
            }
            None => Some(value),
        };
    }
    tokens(text).find_map(|t| {
        WORD_NUMBERS
            .iter()
            .find(|(word, _)| *word == t)
            .map(|(_, value)| *value)
    })
}

/// Token-set Jaccard similarity in [0.0, 1.0].
#[must_use]
pub fn similarity(a: &str, b: &str) -> f64 {
    let left: BTreeSet<String> = tokens(a).collect();
    let right: BTreeSet<String> = tokens(b).collect();
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let shared = left.intersection(&right).count();
    let union = left.union(&right).count();
    #[allow(clippy::cast_precision_loss)]
    let score = shared as f64 / union as f64;
    score
}

/// Renders a number without a trailing ".0" for integral values.
#[must_use]
pub fn format_number(value: f64) -> String {
    if (value - value.round()).abs() < 1e-9 {
        format!("{}", value.round() as i64)
    } else {
        let fixed = format!("{value:.4}");
        fixed.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_punctuation_and_case() {
        assert_eq!(normalize("  Two   HOURS! "), "two hours");
        assert_eq!(normalize("2.5 hours."), "2.5 hours");
        assert_eq!(normalize("?!"), "");
    }

    #[test]
    fn normalize_answer_keeps_value_marks() {
        assert_eq!(normalize_answer("-3 Degrees."), "-3 degrees");
        assert_eq!(normalize_answer("1/2 hour"), "1/2 hour");
        assert_eq!(normalize_answer("40%"), "40%");
        assert_ne!(normalize_answer("-3 degrees"), normalize_answer("3 degrees"));
        assert_eq!(normalize_answer("?!"), "");
    }

    #[test]
    fn fold_keeps_operators() {
        assert_eq!(fold("  Calculate   5+3. "), "calculate 5+3");
        assert_ne!(fold("Calculate 5+3."), fold("Calculate 5*3."));
        assert_ne!(fold("Calculate 5-3."), fold("Calculate 53."));
        assert_eq!(fold("What AM i ?"), fold("what am i"));
    }

    #[test]
    fn contains_phrase_respects_boundaries() {
        assert!(contains_phrase("how long together", "how long"));
        assert!(!contains_phrase("machines run", "machine"));
    }

    #[test]
    fn numbers_in_order() {
        assert_eq!(numbers("in 12, 6, and 4 hours"), vec![12.0, 6.0, 4.0]);
        assert_eq!(numbers("drops -3.5 degrees"), vec![-3.5]);
    }

    #[test]
    fn leading_number_accepts_words() {
        assert_eq!(leading_number("2 hours"), Some(2.0));
        assert_eq!(leading_number("Six presses"), Some(6.0));
        assert_eq!(leading_number("First"), None);
        assert_eq!(leading_number("-3 degrees"), Some(-3.0));
        assert_eq!(leading_number("1/2 hour"), Some(0.5));
    }

    #[test]
    fn similarity_is_jaccard() {
        assert_eq!(similarity("two hours", "two hours"), 1.0);
        assert!((similarity("two hours", "three hours") - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(similarity("", "x"), 0.0);
    }

    #[test]
    fn format_number_trims() {
        assert_eq!(format_number(2.0), "2");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(1.0 / 3.0), "0.3333");
        assert_eq!(format_number(-4.0), "-4");
    }
}
