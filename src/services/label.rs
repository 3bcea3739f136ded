//! Entity label cleanup.
//!
//! Vision models often label the artifact rather than its subject ("marble bust of
//! Abraham Lincoln at the Capitol"). Characters are built around the depicted subject,
//! so depiction labels are rewritten to the subject's name.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DEPICTION_PREFIX: Regex = Regex::new(
        r"(?i)^(?:the\s+)?(?:(?:marble|bronze|stone|wooden)\s+)?(?:bust|portrait|painting|sculpture|carving|engraving|relief|fresco|mosaic|drawing)\s+of\s+(.+)$"
    )
    .unwrap();
    static ref LOCATION_SUFFIX: Regex = Regex::new(r"(?i)^(.+?)\s+(?:at|in)\s+.+$").unwrap();
    static ref MEDIUM_PAREN_SUFFIX: Regex = Regex::new(
        r"(?i)^(.+?)\s+\((?:marble|bronze|stone|wooden|bust|portrait|painting|sculpture|carving).*\)$"
    )
    .unwrap();
    static ref LIST_MARKER: Regex = Regex::new(r"^\s*(?:[-*+•]|\d+[.)])\s+").unwrap();
}

/// Rewrites applied, in order, to a subject recovered from a depiction label.
const SUBJECT_RULES: &[fn(&str) -> String] = &[strip_location_clause, strip_medium_parenthetical];

/// Trims whitespace, surrounding quotes and trailing periods.
pub fn clean_label(value: &str) -> String {
    value
        .trim_matches(|c: char| c.is_whitespace() || c == '"' || c == '\'' || c == '.')
        .to_string()
}

/// Drops Markdown a model wraps around a one-line answer: a leading list marker
/// (`-`, `1.`) and emphasis or code marks on either end.
pub fn strip_markup(value: &str) -> String {
    LIST_MARKER
        .replace(value, "")
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, '*' | '_' | '`' | '"' | '\'' | '.'))
        .to_string()
}

/// `"[medium] bust of X"` → `X`. `None` when the label is not a depiction.
pub fn extract_depicted_subject(label: &str) -> Option<String> {
    DEPICTION_PREFIX
        .captures(label)
        .and_then(|caps| caps.get(1))
        .map(|m| clean_label(m.as_str()))
}

/// `"X at Y"` / `"X in Y"` → `X`.
pub fn strip_location_clause(label: &str) -> String {
    rewrite_with(&LOCATION_SUFFIX, label)
}

/// `"X (marble, bust)"` → `X`.
pub fn strip_medium_parenthetical(label: &str) -> String {
    rewrite_with(&MEDIUM_PAREN_SUFFIX, label)
}

fn rewrite_with(re: &Regex, label: &str) -> String {
    match re.captures(label).and_then(|caps| caps.get(1)) {
        Some(m) => clean_label(m.as_str()),
        None => label.to_string(),
    }
}

fn normalize_once(label: &str) -> String {
    let subject = match extract_depicted_subject(label) {
        Some(subject) => subject,
        None => return label.to_string(),
    };

    let subject = SUBJECT_RULES
        .iter()
        .fold(subject, |current, rule| rule(&current));

    if subject.is_empty() {
        label.to_string()
    } else {
        subject
    }
}

/// Canonical subject name for a model-produced label. Idempotent.
pub fn normalize_entity_label(value: &str) -> String {
    let mut label = clean_label(value);
    // Nested depictions ("bust of a portrait of X") need more than one pass.
    loop {
        let next = normalize_once(&label);
        if next == label {
            return label;
        }
        label = next;
    }
}
