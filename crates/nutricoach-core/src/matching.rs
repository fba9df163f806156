//! Fuzzy reconciliation of model-written names against stored meal and
//! food names.
//!
//! The model only ever sees display names, so every name it returns has to
//! be mapped back onto a row. Both sides are normalized with
//! [`normalize_name`] and then run through an ordered cascade of rules; the
//! first rule that matches any candidate wins.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Lowercase, strip diacritics (NFD then drop combining marks), collapse
/// runs of whitespace and trim.
pub fn normalize_name(name: &str) -> String {
    let stripped: String = name
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Words of at least this many characters take part in the meal token rule.
const SIGNIFICANT_WORD_LEN: usize = 3;

/// Minimum length of the first search word for the food prefix rule.
const PREFIX_WORD_LEN: usize = 4;

/// Find the stored meal that `search` refers to.
///
/// Rules, in order: exact match, stored contains search, search contains
/// stored, then every significant word of the shorter name appears in the
/// longer one (so "Lanche da Tarde" finds "Lanche Tarde").
pub fn match_meal<S: AsRef<str>>(search: &str, candidates: &[S]) -> Option<usize> {
    let needle = normalize_name(search);
    if needle.is_empty() {
        return None;
    }
    let names: Vec<String> = candidates.iter().map(|c| normalize_name(c.as_ref())).collect();

    cascade(&needle, &names).or_else(|| {
        names
            .iter()
            .position(|stored| !stored.is_empty() && words_cover(&needle, stored))
    })
}

/// Find the stored food that `search` refers to within one meal.
///
/// Rules, in order: exact match, stored contains search, search contains
/// stored, then the first word of the search (if long enough) is a prefix
/// of a stored name.
pub fn match_food<S: AsRef<str>>(search: &str, candidates: &[S]) -> Option<usize> {
    let needle = normalize_name(search);
    if needle.is_empty() {
        return None;
    }
    let names: Vec<String> = candidates.iter().map(|c| normalize_name(c.as_ref())).collect();

    cascade(&needle, &names).or_else(|| {
        let first = needle.split(' ').next()?;
        if first.chars().count() < PREFIX_WORD_LEN {
            return None;
        }
        names.iter().position(|stored| stored.starts_with(first))
    })
}

/// The three rules shared by meals and foods.
fn cascade(needle: &str, names: &[String]) -> Option<usize> {
    names
        .iter()
        .position(|stored| stored == needle)
        .or_else(|| names.iter().position(|stored| stored.contains(needle)))
        .or_else(|| {
            names
                .iter()
                .position(|stored| !stored.is_empty() && needle.contains(stored.as_str()))
        })
}

/// True when all significant words of one name occur as words of the other.
fn words_cover(a: &str, b: &str) -> bool {
    let significant = |s: &str| -> Vec<String> {
        s.split(' ')
            .filter(|w| w.chars().count() >= SIGNIFICANT_WORD_LEN)
            .map(str::to_owned)
            .collect()
    };
    let (wa, wb) = (significant(a), significant(b));
    if wa.is_empty() || wb.is_empty() {
        return false;
    }
    let (small, large) = if wa.len() <= wb.len() { (&wa, &wb) } else { (&wb, &wa) };
    small.iter().all(|w| large.contains(w))
}
