//! Follow-up tool suggestions derived from goal wording.

use std::sync::LazyLock;

use regex::Regex;

/// `pattern → suggestion`, reported in table order.
const SUGGESTIONS: &[(&str, &str)] = &[
    (
        r"(?i)\b(filters?|organi[sz]e|labels?|sort)\b",
        "Mail filters: create and manage filters for automatic organization",
    ),
    (
        r"(?i)\b(templates?|compose|drafts?)\b",
        "Email templates: pre-built templates for common messages",
    ),
    (
        r"(?i)\b(reminders?|notify|alerts?)\b",
        "Calendar reminders: set and manage event reminders",
    ),
    (
        r"(?i)\b(schedule|send later)\b",
        "Email scheduling: send messages at a specific time",
    ),
    (
        r"(?i)\b(share|permissions?|access)\b",
        "Calendar sharing: share calendars with other people",
    ),
    (
        r"(?i)\b(bulk|multiple|batch)\b",
        "Bulk operations: act on many emails or events at once",
    ),
];

static COMPILED: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    SUGGESTIONS
        .iter()
        .map(|(pattern, text)| {
            (
                Regex::new(pattern).expect("suggestion pattern should be valid"),
                *text,
            )
        })
        .collect()
});

/// Capabilities that would serve `goal` better than the current tool set.
pub fn suggest_tools(goal: &str) -> Vec<String> {
    COMPILED
        .iter()
        .filter(|(re, _)| re.is_match(goal))
        .map(|(_, text)| (*text).to_string())
        .collect()
}
