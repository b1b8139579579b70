//! Deterministic tool selection from a goal string.
//!
//! Selection is an ordered rule table: a goal is first classified into zero or
//! more domains by trigger keywords, then each matched domain picks exactly one
//! tool with first-match-wins precedence. Precedence lives in [`DOMAINS`], not
//! in control flow.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::tool_ids;

/// Service domain a goal can touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Email,
    Calendar,
}

/// One `pattern → tool` entry.
#[derive(Debug)]
pub struct Rule {
    pub pattern: &'static str,
    pub tool: &'static str,
}

/// Trigger pattern, ordered operation rules and fallback for one domain.
#[derive(Debug)]
pub struct DomainRules {
    pub domain: Domain,
    pub triggers: &'static str,
    pub rules: &'static [Rule],
    pub fallback: &'static str,
}

/// Tool used when no domain matches. Read-only.
pub const DEFAULT_TOOL: &str = tool_ids::QUERY_EMAIL;

/// Domains in evaluation order. Within a domain, the first matching rule wins.
pub static DOMAINS: &[DomainRules] = &[
    DomainRules {
        domain: Domain::Email,
        triggers: r"(?i)\b(e-?mails?|gmail|mail|inbox|send|read|messages?)\b",
        rules: &[
            Rule {
                pattern: r"(?i)\b(count|how many|total)\b",
                tool: tool_ids::QUERY_EMAIL,
            },
            Rule {
                pattern: r"(?i)\b(read|open|show)\b.*\b(message|email)\s+id\b",
                tool: tool_ids::READ_EMAIL,
            },
            Rule {
                pattern: r"(?i)\b(read|show|display)\b",
                tool: tool_ids::QUERY_EMAIL,
            },
            Rule {
                pattern: r"(?i)\b(send|write)\b",
                tool: tool_ids::SEND_EMAIL,
            },
            Rule {
                pattern: r"(?i)\b(labels?|folders?)\b",
                tool: tool_ids::LIST_LABELS,
            },
        ],
        fallback: tool_ids::QUERY_EMAIL,
    },
    DomainRules {
        domain: Domain::Calendar,
        triggers: r"(?i)\b(calendars?|events?|schedules?|meetings?|appointments?)\b",
        rules: &[
            Rule {
                pattern: r"(?i)\b(create|add)\b",
                tool: tool_ids::CREATE_EVENT,
            },
            Rule {
                pattern: r"(?i)\b(delete|remove|cancel)\b",
                tool: tool_ids::DELETE_EVENT,
            },
            Rule {
                pattern: r"(?i)\blist\s+(all|calendars)\b",
                tool: tool_ids::LIST_CALENDARS,
            },
        ],
        fallback: tool_ids::QUERY_EVENTS,
    },
];

struct CompiledDomain {
    domain: Domain,
    triggers: Regex,
    rules: Vec<(Regex, &'static str)>,
    fallback: &'static str,
}

static COMPILED: LazyLock<Vec<CompiledDomain>> = LazyLock::new(|| {
    DOMAINS
        .iter()
        .map(|d| CompiledDomain {
            domain: d.domain,
            triggers: Regex::new(d.triggers).expect("domain trigger pattern should be valid"),
            rules: d
                .rules
                .iter()
                .map(|r| {
                    (
                        Regex::new(r.pattern).expect("rule pattern should be valid"),
                        r.tool,
                    )
                })
                .collect(),
            fallback: d.fallback,
        })
        .collect()
});

/// Domains whose trigger keywords appear in `goal`, in table order.
pub fn classify_domains(goal: &str) -> Vec<Domain> {
    COMPILED
        .iter()
        .filter(|d| d.triggers.is_match(goal))
        .map(|d| d.domain)
        .collect()
}

/// Select the tools for `goal`: one per matched domain, never empty.
pub fn select_tools(goal: &str) -> Vec<&'static str> {
    let tools: Vec<&'static str> = COMPILED
        .iter()
        .filter(|d| d.triggers.is_match(goal))
        .map(|d| {
            d.rules
                .iter()
                .find(|(pattern, _)| pattern.is_match(goal))
                .map(|(_, tool)| *tool)
                .unwrap_or(d.fallback)
        })
        .collect();

    if tools.is_empty() {
        vec![DEFAULT_TOOL]
    } else {
        tools
    }
}
