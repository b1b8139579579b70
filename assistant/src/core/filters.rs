//! Provider-agnostic email search filters built from goal text.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Search expression plus count flags for an email query.
///
/// `count_all` asks for an exact count (exhaust pagination); `count_only`
/// asks for the service's cheap estimate. They are set independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailQuery {
    pub query: String,
    pub count_all: bool,
    pub count_only: bool,
    pub max_results: Option<u32>,
}

pub(crate) static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b")
        .expect("email pattern should be valid")
});

static INBOX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\binbox\b").expect("inbox pattern should be valid"));

static SENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bsent\b").expect("sent pattern should be valid"));

static DRAFT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bdrafts?\b").expect("draft pattern should be valid"));

static UNREAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bunread\b").expect("unread pattern should be valid"));

static COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(how many|count|total)\b").expect("count pattern should be valid")
});

static ESTIMATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(estimate[sd]?|roughly|approximately|approx|about)\b")
        .expect("estimate pattern should be valid")
});

static LIMIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,3})\s+(?:\w+\s+)?(?:e-?mails|messages)\b")
        .expect("limit pattern should be valid")
});

/// First email address mentioned in `text`.
pub fn first_email_address(text: &str) -> Option<&str> {
    EMAIL_RE.find(text).map(|m| m.as_str())
}

/// Build the search expression and count flags for an email goal.
///
/// Clause order is sender, folder, unread state, joined by single spaces.
pub fn build_email_query(goal: &str) -> EmailQuery {
    let mut clauses: Vec<String> = Vec::new();

    if let Some(address) = first_email_address(goal) {
        clauses.push(format!("from:{address}"));
    }

    if INBOX_RE.is_match(goal) {
        clauses.push("in:inbox".to_string());
    } else if SENT_RE.is_match(goal) {
        clauses.push("in:sent".to_string());
    } else if DRAFT_RE.is_match(goal) {
        clauses.push("in:draft".to_string());
    }

    if UNREAD_RE.is_match(goal) {
        clauses.push("is:unread".to_string());
    }

    let counting = COUNT_RE.is_match(goal);
    let estimate = counting && ESTIMATE_RE.is_match(goal);

    let max_results = LIMIT_RE
        .captures(goal)
        .and_then(|caps| caps[1].parse::<u32>().ok())
        .filter(|n| *n > 0);

    EmailQuery {
        query: clauses.join(" "),
        count_all: counting && !estimate,
        count_only: estimate,
        max_results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_and_unread_with_accurate_count() {
        let q = build_email_query("how many unread emails from alice@example.com");
        assert_eq!(q.query, "from:alice@example.com is:unread");
        assert!(q.count_all);
        assert!(!q.count_only);
    }

    #[test]
    fn sender_keeps_folder_qualifier() {
        let q = build_email_query("emails in my inbox from bob@example.org");
        assert_eq!(q.query, "from:bob@example.org in:inbox");
        assert!(!q.count_all);
    }

    #[test]
    fn folder_keywords_map_to_in_clauses() {
        assert_eq!(build_email_query("show my sent mail").query, "in:sent");
        assert_eq!(build_email_query("list drafts").query, "in:draft");
        assert_eq!(
            build_email_query("unread in inbox").query,
            "in:inbox is:unread"
        );
    }

    #[test]
    fn folder_words_need_word_boundaries() {
        assert_eq!(build_email_query("present the consent form").query, "");
    }

    #[test]
    fn estimate_qualifier_sets_count_only() {
        let q = build_email_query("roughly how many emails are in my inbox");
        assert!(q.count_only);
        assert!(!q.count_all);
        assert_eq!(q.query, "in:inbox");
    }

    #[test]
    fn plain_goal_has_empty_query_and_no_flags() {
        let q = build_email_query("show my email");
        assert_eq!(q.query, "");
        assert!(!q.count_all);
        assert!(!q.count_only);
        assert_eq!(q.max_results, None);
    }

    #[test]
    fn explicit_result_limit_is_extracted() {
        assert_eq!(
            build_email_query("show the last 25 unread emails").max_results,
            Some(25)
        );
        assert_eq!(build_email_query("show 5 messages").max_results, Some(5));
    }

    #[test]
    fn first_address_wins() {
        let q = build_email_query("mail from a@x.io or b@y.io");
        assert_eq!(q.query, "from:a@x.io");
    }
}
