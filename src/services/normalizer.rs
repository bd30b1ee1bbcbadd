//! Ingredient text normalizer.
//!
//! Turns the free-text "Tên hoạt chất" column of a registration sheet into an
//! ordered list of cleaned ingredient names. The input mixes Vietnamese
//! boilerplate, dosage amounts, units and several ingredients per cell;
//! the rules below are applied in order, each on the output of the previous.

use once_cell::sync::Lazy;
use regex::Regex;

/// Ordered cleaning rules. Order matters: dosage units must go before the
/// standalone-number rule or "500mg" would leave "mg" behind.
static CLEANING_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // Container boilerplate ending in the "chứa:" (contains) marker,
        // e.g. "Mỗi viên chứa: ..."
        Regex::new(r"(?i).*? chứa: ").unwrap(),
        // Dosage-form parentheticals, e.g. "(dưới dạng paracetamol natri)"
        Regex::new(r"(?i)\(dưới dạng .*?\)").unwrap(),
        // Quantities with a unit suffix: 500mg, 5ml, 200IU, 10mcg, 5%
        Regex::new(r"(?i)\d+(mg|g|ml|iu|mcg|%)\b").unwrap(),
        // Ratio-style dosages left over after unit stripping, e.g. 500/125
        Regex::new(r"\d+/\d+").unwrap(),
        // Any remaining standalone numbers
        Regex::new(r"\b\d+\b").unwrap(),
    ]
});

static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[;,\-\n]").unwrap());

static RESIDUAL_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[/\\,]").unwrap());

/// Cleans and splits a raw ingredient string into ingredient names.
///
/// Duplicates within one input are kept; deduplication is the reconciler's
/// concern. An empty or blank input yields an empty list, not an error.
pub fn normalize_ingredients(raw: &str) -> Vec<String> {
    let mut cleaned = raw.to_lowercase().trim().to_string();

    for rule in CLEANING_RULES.iter() {
        cleaned = rule.replace_all(&cleaned, "").into_owned();
    }

    SEPARATORS
        .split(&cleaned)
        .map(|segment| RESIDUAL_CHARS.replace_all(segment, "").trim().to_string())
        .filter(|segment| !segment.is_empty())
        .map(|segment| title_case(&segment))
        .collect()
}

/// Capitalizes the first letter of every whitespace-separated word, leaving
/// the rest of the word unchanged, for cross-record comparability.
fn title_case(segment: &str) -> String {
    segment
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
