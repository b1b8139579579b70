//! Parameter resolution: goal text + tool id → structured tool arguments.
//!
//! Pure functions only. Anything the resolver had to guess is reported in
//! [`Resolution::notes`] rather than as an error.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use serde_json::{Value, json};

use crate::core::dates::resolve_date_range;
use crate::core::filters::{build_email_query, first_email_address};
use crate::core::tool_ids;
use crate::core::types::Arguments;

/// Calendar used when the goal names none.
pub const DEFAULT_CALENDAR: &str = "primary";

/// Arguments for one tool plus human-readable resolution notes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub arguments: Arguments,
    pub notes: Vec<String>,
}

static ISO_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{4}-\d{2}-\d{2}(?:T\d{2}:\d{2}(?::\d{2})?)?\b")
        .expect("iso date pattern should be valid")
});

static QUOTED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""([^"]+)"|“([^”]+)”"#).expect("quoted text pattern should be valid")
});

static SUBJECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bsubject\b[:\s]*"([^"]+)""#).expect("subject pattern should be valid")
});

static BODY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:saying|body|that says)\b[:\s]*"([^"]+)""#)
        .expect("body pattern should be valid")
});

static MESSAGE_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:message|email)\s+id[:\s]+([A-Za-z0-9_-]+)")
        .expect("message id pattern should be valid")
});

static EVENT_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bevent[\s_]id[:\s]+([A-Za-z0-9_-]+)").expect("event id pattern should be valid")
});

static WORK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bwork\b").expect("work pattern should be valid"));

fn first_quoted(goal: &str) -> Option<String> {
    QUOTED_RE.captures(goal).and_then(|caps| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().trim().to_string())
    })
}

fn capture(re: &Regex, goal: &str) -> Option<String> {
    re.captures(goal).map(|caps| caps[1].trim().to_string())
}

/// Resolve the arguments `tool` needs for `goal`, relative to `reference`.
///
/// Unknown tools get an empty argument map.
pub fn resolve_parameters(goal: &str, tool: &str, reference: NaiveDate) -> Resolution {
    let mut arguments = Arguments::new();
    let mut notes = Vec::new();

    match tool {
        tool_ids::QUERY_EMAIL => {
            let query = build_email_query(goal);
            arguments.insert("query".to_string(), Value::String(query.query));
            arguments.insert("count_all".to_string(), Value::Bool(query.count_all));
            arguments.insert("count_only".to_string(), Value::Bool(query.count_only));
            if let Some(max) = query.max_results {
                arguments.insert("max_results".to_string(), json!(max));
            }
        }
        tool_ids::READ_EMAIL => {
            if let Some(id) = capture(&MESSAGE_ID_RE, goal) {
                arguments.insert("message_id".to_string(), Value::String(id));
            } else {
                notes.push("no message id found in goal".to_string());
            }
        }
        tool_ids::SEND_EMAIL => {
            if let Some(to) = first_email_address(goal) {
                arguments.insert("to".to_string(), Value::String(to.to_string()));
            }
            if let Some(subject) = capture(&SUBJECT_RE, goal) {
                arguments.insert("subject".to_string(), Value::String(subject));
            }
            if let Some(body) = capture(&BODY_RE, goal) {
                arguments.insert("body".to_string(), Value::String(body));
            }
        }
        tool_ids::QUERY_EVENTS => {
            arguments.insert(
                "calendar_id".to_string(),
                Value::String(DEFAULT_CALENDAR.to_string()),
            );
            let resolved = resolve_date_range(goal, reference);
            arguments.insert(
                "time_min".to_string(),
                Value::String(resolved.range.start().to_string()),
            );
            arguments.insert(
                "time_max".to_string(),
                Value::String(resolved.range.end().to_string()),
            );
            if let Some(ambiguity) = resolved.ambiguity {
                notes.push(ambiguity.describe());
            }
            let search_text = first_quoted(goal)
                .or_else(|| WORK_RE.is_match(goal).then(|| "Work".to_string()));
            if let Some(text) = search_text {
                arguments.insert("search_text".to_string(), Value::String(text));
            }
        }
        tool_ids::CREATE_EVENT => {
            arguments.insert(
                "calendar_id".to_string(),
                Value::String(DEFAULT_CALENDAR.to_string()),
            );
            let mut dates = ISO_DATE_RE.find_iter(goal).map(|m| m.as_str().to_string());
            if let Some(start) = dates.next() {
                arguments.insert("start_time".to_string(), Value::String(start.clone()));
                let end = dates.next().unwrap_or(start);
                arguments.insert("end_time".to_string(), Value::String(end));
            } else {
                notes.push("no ISO date found for the new event".to_string());
            }
            if let Some(summary) = first_quoted(goal) {
                arguments.insert("summary".to_string(), Value::String(summary));
            }
        }
        tool_ids::DELETE_EVENT => {
            arguments.insert(
                "calendar_id".to_string(),
                Value::String(DEFAULT_CALENDAR.to_string()),
            );
            if let Some(id) = capture(&EVENT_ID_RE, goal) {
                arguments.insert("event_id".to_string(), Value::String(id));
            } else {
                notes.push("no event id found in goal".to_string());
            }
        }
        _ => {}
    }

    Resolution { arguments, notes }
}

/// One resolved tool call, ready to propose or print.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedCall {
    pub tool: String,
    pub arguments: Arguments,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

/// Resolve arguments for each tool in order.
pub fn plan_calls<'a, I>(goal: &str, tools: I, reference: NaiveDate) -> Vec<PlannedCall>
where
    I: IntoIterator<Item = &'a str>,
{
    tools
        .into_iter()
        .map(|tool| {
            let Resolution { arguments, notes } = resolve_parameters(goal, tool, reference);
            PlannedCall {
                tool: tool.to_string(),
                arguments,
                notes,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, 15).expect("valid date")
    }

    #[test]
    fn email_query_arguments() {
        let res = resolve_parameters(
            "how many unread emails from alice@example.com",
            tool_ids::QUERY_EMAIL,
            reference(),
        );
        assert_eq!(
            res.arguments.get("query"),
            Some(&json!("from:alice@example.com is:unread"))
        );
        assert_eq!(res.arguments.get("count_all"), Some(&json!(true)));
        assert_eq!(res.arguments.get("count_only"), Some(&json!(false)));
        assert!(!res.arguments.contains_key("max_results"));
        assert!(res.notes.is_empty());
    }

    #[test]
    fn calendar_query_arguments_use_inferred_week() {
        let res = resolve_parameters(
            "What events are in the third week of January?",
            tool_ids::QUERY_EVENTS,
            reference(),
        );
        assert_eq!(res.arguments.get("calendar_id"), Some(&json!("primary")));
        assert_eq!(res.arguments.get("time_min"), Some(&json!("2025-01-20")));
        assert_eq!(res.arguments.get("time_max"), Some(&json!("2025-01-26")));
        assert!(!res.arguments.contains_key("search_text"));
    }

    #[test]
    fn clamped_week_is_reported_as_note() {
        let res = resolve_parameters(
            "meetings in the fifth week of february",
            tool_ids::QUERY_EVENTS,
            reference(),
        );
        assert_eq!(res.notes.len(), 1);
        assert!(res.notes[0].contains("week 4"));
    }

    #[test]
    fn calendar_search_text_from_quotes_or_work() {
        let quoted = resolve_parameters(
            "find \"Standup\" events this week",
            tool_ids::QUERY_EVENTS,
            reference(),
        );
        assert_eq!(quoted.arguments.get("search_text"), Some(&json!("Standup")));

        let work = resolve_parameters("work meetings today", tool_ids::QUERY_EVENTS, reference());
        assert_eq!(work.arguments.get("search_text"), Some(&json!("Work")));
        assert_eq!(work.arguments.get("time_min"), Some(&json!("2024-12-15")));
        assert_eq!(work.arguments.get("time_max"), Some(&json!("2024-12-15")));
    }

    #[test]
    fn create_event_takes_iso_dates_and_title() {
        let res = resolve_parameters(
            "add \"Planning\" to my calendar from 2025-01-20T10:00 to 2025-01-20T11:00",
            tool_ids::CREATE_EVENT,
            reference(),
        );
        assert_eq!(res.arguments.get("start_time"), Some(&json!("2025-01-20T10:00")));
        assert_eq!(res.arguments.get("end_time"), Some(&json!("2025-01-20T11:00")));
        assert_eq!(res.arguments.get("summary"), Some(&json!("Planning")));
    }

    #[test]
    fn create_event_without_date_notes_it() {
        let res = resolve_parameters("create a meeting", tool_ids::CREATE_EVENT, reference());
        assert!(!res.arguments.contains_key("start_time"));
        assert_eq!(res.notes, vec!["no ISO date found for the new event".to_string()]);
    }

    #[test]
    fn send_email_extracts_recipient_subject_body() {
        let res = resolve_parameters(
            "send an email to bob@example.com with subject \"Lunch\" saying \"Noon works\"",
            tool_ids::SEND_EMAIL,
            reference(),
        );
        assert_eq!(res.arguments.get("to"), Some(&json!("bob@example.com")));
        assert_eq!(res.arguments.get("subject"), Some(&json!("Lunch")));
        assert_eq!(res.arguments.get("body"), Some(&json!("Noon works")));
    }

    #[test]
    fn id_based_tools_extract_ids() {
        let read = resolve_parameters("read the email id 18c2f", tool_ids::READ_EMAIL, reference());
        assert_eq!(read.arguments.get("message_id"), Some(&json!("18c2f")));

        let delete = resolve_parameters(
            "delete event id abc_123 from my calendar",
            tool_ids::DELETE_EVENT,
            reference(),
        );
        assert_eq!(delete.arguments.get("event_id"), Some(&json!("abc_123")));
    }

    #[test]
    fn unknown_tool_gets_empty_arguments() {
        let res = resolve_parameters("anything", "list_labels", reference());
        assert!(res.arguments.is_empty());
        assert!(res.notes.is_empty());
    }

    #[test]
    fn plan_calls_keeps_tool_order() {
        let calls = plan_calls(
            "how many unread emails and what meetings today",
            [tool_ids::QUERY_EMAIL, tool_ids::QUERY_EVENTS],
            reference(),
        );
        let tools: Vec<&str> = calls.iter().map(|c| c.tool.as_str()).collect();
        assert_eq!(tools, vec![tool_ids::QUERY_EMAIL, tool_ids::QUERY_EVENTS]);
        assert_eq!(calls[1].arguments.get("time_min"), Some(&json!("2024-12-15")));
    }
}
