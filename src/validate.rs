//! Input validation and normalization.
//!
//! Provides O(1) synonym maps so files written by hand or by other tools
//! can use natural words for statuses and priorities. Three-tier
//! resolution: exact match → synonym lookup → error with suggestion.
//!
//! Also holds the schema limits the repository enforces before any write.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use crate::error::{Error, Result};
use crate::model::{Blocking, Priority, RecurrenceRule, Status, TaskDocument};

pub const MAX_TITLE_LEN: usize = 255;
pub const MAX_BODY_LEN: usize = 100_000;
pub const MAX_TAGS: usize = 64;
pub const MAX_TAG_LEN: usize = 64;
pub const MAX_NAME_LEN: usize = 255;

// ── Valid value sets (O(1) lookups) ──────────────────────────

pub static VALID_STATUSES: LazyLock<HashSet<&str>> = LazyLock::new(|| {
    ["todo", "doing", "waiting", "done", "cancelled"]
        .into_iter()
        .collect()
});

// ── Synonym maps ─────────────────────────────────────────────

pub static STATUS_SYNONYMS: LazyLock<HashMap<&str, &str>> = LazyLock::new(|| {
    [
        ("open", "todo"),
        ("new", "todo"),
        ("pending", "todo"),
        ("backlog", "todo"),
        ("wip", "doing"),
        ("active", "doing"),
        ("started", "doing"),
        ("in_progress", "doing"),
        ("in-progress", "doing"),
        ("blocked", "waiting"),
        ("hold", "waiting"),
        ("on_hold", "waiting"),
        ("deferred", "waiting"),
        ("complete", "done"),
        ("completed", "done"),
        ("closed", "done"),
        ("finished", "done"),
        ("resolved", "done"),
        ("canceled", "cancelled"),
        ("dropped", "cancelled"),
        ("wontfix", "cancelled"),
    ]
    .into_iter()
    .collect()
});

pub static PRIORITY_SYNONYMS: LazyLock<HashMap<&str, Priority>> = LazyLock::new(|| {
    [
        ("none", Priority::None),
        ("no", Priority::None),
        ("low", Priority::Low),
        ("minor", Priority::Low),
        ("medium", Priority::Medium),
        ("normal", Priority::Medium),
        ("med", Priority::Medium),
        ("high", Priority::High),
        ("urgent", Priority::High),
        ("important", Priority::High),
        ("critical", Priority::High),
    ]
    .into_iter()
    .collect()
});

/// Normalize a status string via exact match or synonym lookup.
///
/// Returns the canonical status, or an error with the original input
/// and an optional suggestion.
pub fn normalize_status(input: &str) -> std::result::Result<Status, (String, Option<String>)> {
    let lower = input.trim().to_lowercase();

    // Tier 1: exact match
    if VALID_STATUSES.contains(lower.as_str()) {
        if let Ok(status) = lower.parse() {
            return Ok(status);
        }
    }

    // Tier 2: synonym lookup
    if let Some(status) = STATUS_SYNONYMS.get(lower.as_str()).and_then(|c| c.parse().ok()) {
        return Ok(status);
    }

    // Tier 3: find closest suggestion
    let suggestion = find_closest_match(&lower, &VALID_STATUSES, &STATUS_SYNONYMS);
    Err((input.to_string(), suggestion))
}

/// Normalize a priority from a word, a 0-3 level, or `!`-marks.
///
/// Accepts: "0"-"3", "P0"-"P3", "!", "!!", "!!!", "high", "urgent", etc.
pub fn normalize_priority(input: &str) -> std::result::Result<Priority, (String, Option<String>)> {
    let lower = input.trim().to_lowercase();

    // Tier 1: direct level, optionally P-prefixed
    let digits = lower.strip_prefix('p').unwrap_or(&lower);
    if let Ok(n) = digits.parse::<u8>() {
        return Priority::from_level(n).ok_or_else(|| {
            (
                input.to_string(),
                Some("Priority must be 0-3 (0=none, 3=high)".to_string()),
            )
        });
    }

    // Tier 2: bang notation
    if !lower.is_empty() && lower.chars().all(|c| c == '!') {
        if let Some(p) = u8::try_from(lower.len()).ok().and_then(Priority::from_level) {
            return Ok(p);
        }
    }

    // Tier 3: synonym lookup
    if let Some(&p) = PRIORITY_SYNONYMS.get(lower.as_str()) {
        return Ok(p);
    }

    Err((
        input.to_string(),
        Some("Use 0-3, P0-P3, or: none, low, medium, high".to_string()),
    ))
}

/// Find the closest matching value across valid set and synonyms.
fn find_closest_match(
    input: &str,
    valid: &HashSet<&str>,
    synonyms: &HashMap<&str, &str>,
) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;

    for &v in valid.iter().chain(synonyms.keys()) {
        let dist = levenshtein_distance(input, v);
        if dist <= 3 && best.is_none_or(|(_, d)| dist < d) {
            // For synonyms, show what it maps to
            let shown = synonyms.get(v).copied().unwrap_or(v);
            best = Some((shown, dist));
        }
    }

    best.map(|(v, _)| v.to_string())
}

// ── Schema limits ────────────────────────────────────────────

/// Check whether `s` is `<prefix>` followed by lowercase hex digits.
#[must_use]
pub fn is_reference_id(s: &str, prefix: &str) -> bool {
    s.strip_prefix(prefix).is_some_and(|hex| {
        !hex.is_empty() && hex.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    })
}

/// Validate required fields and length limits of a document.
///
/// # Errors
///
/// Returns `Error::Validation` naming the first offending field.
pub fn validate_document(doc: &TaskDocument, reference_prefix: &str) -> Result<()> {
    let title = doc.title.trim();
    if title.is_empty() {
        return Err(Error::validation("title", "must not be empty"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(Error::validation(
            "title",
            format!("must be at most {MAX_TITLE_LEN} characters"),
        ));
    }
    if doc.title.contains(['\n', '\r']) {
        return Err(Error::validation("title", "must be a single line"));
    }

    if doc.body.chars().count() > MAX_BODY_LEN {
        return Err(Error::validation(
            "body",
            format!("must be at most {MAX_BODY_LEN} characters"),
        ));
    }

    if doc.tags.len() > MAX_TAGS {
        return Err(Error::validation("tags", format!("at most {MAX_TAGS} tags")));
    }
    for tag in &doc.tags {
        if tag.is_empty() || tag.chars().count() > MAX_TAG_LEN {
            return Err(Error::validation(
                "tags",
                format!("each tag must be 1-{MAX_TAG_LEN} characters"),
            ));
        }
        if tag.contains(|c: char| c.is_whitespace() || matches!(c, ',' | '[' | ']')) {
            return Err(Error::validation(
                "tags",
                format!("tag '{tag}' must not contain whitespace, commas or brackets"),
            ));
        }
    }

    for (field, value) in [
        ("area", &doc.area),
        ("project", &doc.project),
        ("assignee", &doc.assignee),
        ("completed_by", &doc.completed_by),
        ("source", &doc.source),
    ] {
        if let Some(value) = value {
            if value.chars().count() > MAX_NAME_LEN || value.contains(['\n', '\r']) {
                return Err(Error::validation(
                    field,
                    format!("must be a single line of at most {MAX_NAME_LEN} characters"),
                ));
            }
        }
    }

    if let Some(reference) = &doc.reference {
        if !is_reference_id(reference, reference_prefix) {
            return Err(Error::validation(
                "ref",
                format!("must look like {reference_prefix}<hex>"),
            ));
        }
    }

    if let Blocking::By(refs) = &doc.blocking {
        if refs.is_empty() {
            return Err(Error::validation("blocked_by", "must list at least one reference"));
        }
        if let Some(bad) = refs.iter().find(|r| !is_reference_id(r, reference_prefix)) {
            return Err(Error::validation(
                "blocked_by",
                format!("'{bad}' is not a reference id"),
            ));
        }
    }

    if let Some(rule) = &doc.recurrence {
        RecurrenceRule::parse(rule).map_err(|reason| Error::validation("recurrence", reason))?;
    }

    if doc.status == Status::Done && doc.completed.is_none() {
        return Err(Error::validation("completed", "done tasks need a completion time"));
    }

    Ok(())
}

// ── Levenshtein distance ─────────────────────────────────────

/// Compute the Levenshtein edit distance between two strings.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let a_len = a.len();
    let b_len = b.len();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    // Use single-row optimization (O(min(m,n)) space)
    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for i in 1..=a_len {
        curr[0] = i;
        for j in 1..=b_len {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1) // deletion
                .min(curr[j - 1] + 1) // insertion
                .min(prev[j - 1] + cost); // substitution
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}

/// Find known reference ids similar to the searched one.
///
/// Returns up to `max` suggestions with edit distance ≤ 2,
/// sorted by distance then alphabetically.
pub fn find_similar_ids<'a>(
    searched: &str,
    existing: impl IntoIterator<Item = &'a String>,
    max: usize,
) -> Vec<String> {
    let mut candidates: Vec<(usize, &str)> = existing
        .into_iter()
        .map(|id| (levenshtein_distance(searched, id), id.as_str()))
        .filter(|(dist, _)| *dist <= 2)
        .collect();

    candidates.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));

    candidates
        .into_iter()
        .take(max)
        .map(|(_, id)| id.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_normalize_status() {
        assert_eq!(normalize_status("todo"), Ok(Status::Todo));
        assert_eq!(normalize_status("DONE"), Ok(Status::Done));
        assert_eq!(normalize_status("wip"), Ok(Status::Doing));
        assert_eq!(normalize_status("canceled"), Ok(Status::Cancelled));
        assert!(normalize_status("nonsense").is_err());
    }

    #[test]
    fn test_status_suggestion() {
        let err = normalize_status("doen").unwrap_err();
        assert_eq!(err.1.as_deref(), Some("done"));
    }

    #[test]
    fn test_normalize_priority() {
        assert_eq!(normalize_priority("2"), Ok(Priority::Medium));
        assert_eq!(normalize_priority("P3"), Ok(Priority::High));
        assert_eq!(normalize_priority("!!"), Ok(Priority::Medium));
        assert_eq!(normalize_priority("urgent"), Ok(Priority::High));
        assert!(normalize_priority("9").is_err());
        assert!(normalize_priority("whenever").is_err());
    }

    #[test]
    fn test_is_reference_id() {
        assert!(is_reference_id("T-1a2b", "T-"));
        assert!(!is_reference_id("T-", "T-"));
        assert!(!is_reference_id("T-XYZ1", "T-"));
        assert!(!is_reference_id("1a2b", "T-"));
    }

    #[test]
    fn test_validate_document_limits() {
        let mut doc = TaskDocument::new("  ");
        assert!(matches!(
            validate_document(&doc, "T-"),
            Err(Error::Validation { ref field, .. }) if field == "title"
        ));

        doc.title = "x".repeat(MAX_TITLE_LEN + 1);
        assert!(validate_document(&doc, "T-").is_err());

        doc.title = "Fine".into();
        doc.tags = vec!["two words".into()];
        assert!(validate_document(&doc, "T-").is_err());

        doc.tags = vec!["ok".into()];
        doc.blocking = Blocking::By(vec![]);
        assert!(validate_document(&doc, "T-").is_err());

        doc.blocking = Blocking::By(vec!["T-00aa".into()]);
        doc.recurrence = Some("whenever".into());
        assert!(validate_document(&doc, "T-").is_err());

        doc.recurrence = Some("weekly".into());
        assert!(validate_document(&doc, "T-").is_ok());
    }

    #[test]
    fn test_done_requires_completion() {
        let mut doc = TaskDocument::new("Finish");
        doc.status = Status::Done;
        assert!(validate_document(&doc, "T-").is_err());

        doc.completed = Some(Utc::now());
        assert!(validate_document(&doc, "T-").is_ok());
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein_distance("", ""), 0);
        assert_eq!(levenshtein_distance("abc", "abc"), 0);
        assert_eq!(levenshtein_distance("abc", "abd"), 1);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
    }

    #[test]
    fn test_find_similar_ids() {
        let ids = vec!["T-a1b2".to_string(), "T-a1b3".to_string(), "T-ffff".to_string()];
        let result = find_similar_ids("T-a1b1", &ids, 3);
        assert_eq!(result, vec!["T-a1b2".to_string(), "T-a1b3".to_string()]);
    }
}
