//! Date-range inference for calendar expressions in goal text.
//!
//! Handles an explicit month plus ordinal week ("third week in January"),
//! "today", "this week" / "next week", and falls back to the current week.
//! Inference never fails; missing information degrades to a wider guess.
//! Weeks always run Monday to Sunday.

use std::sync::LazyLock;

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::Serialize;

use crate::core::types::DateRange;

/// Something the resolver had to guess about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DateAmbiguity {
    /// The month has no `requested`-th Monday; the last one (`used`) was taken.
    WeekClamped { requested: u32, used: u32 },
}

impl DateAmbiguity {
    pub fn describe(&self) -> String {
        match self {
            DateAmbiguity::WeekClamped { requested, used } => format!(
                "month has no week {requested} starting on a Monday; using week {used} instead"
            ),
        }
    }
}

/// Inferred range and any ambiguity encountered on the way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateResolution {
    pub range: DateRange,
    pub ambiguity: Option<DateAmbiguity>,
}

impl DateResolution {
    fn exact(range: DateRange) -> Self {
        Self {
            range,
            ambiguity: None,
        }
    }
}

// Full names precede abbreviations so "march" never matches as "mar".
static MONTH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sep|sept|oct|nov|dec)\b",
    )
    .expect("month pattern should be valid")
});

static ORDINAL_WEEK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(first|second|third|fourth|fifth|1st|2nd|3rd|4th|5th)\s+week\b")
        .expect("ordinal week pattern should be valid")
});

static TODAY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\btoday\b").expect("today pattern should be valid"));

static WEEK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bweek\b").expect("week pattern should be valid"));

static NEXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bnext\b").expect("next pattern should be valid"));

/// Month number (1 to 12) for a full or abbreviated English month name.
pub fn month_number(name: &str) -> Option<u32> {
    let month = match name.to_ascii_lowercase().as_str() {
        "january" | "jan" => 1,
        "february" | "feb" => 2,
        "march" | "mar" => 3,
        "april" | "apr" => 4,
        "may" => 5,
        "june" | "jun" => 6,
        "july" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sep" | "sept" => 9,
        "october" | "oct" => 10,
        "november" | "nov" => 11,
        "december" | "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn ordinal_number(word: &str) -> Option<u32> {
    let n = match word.to_ascii_lowercase().as_str() {
        "first" | "1st" => 1,
        "second" | "2nd" => 2,
        "third" | "3rd" => 3,
        "fourth" | "4th" => 4,
        "fifth" | "5th" => 5,
        _ => return None,
    };
    Some(n)
}

/// Year of the next occurrence of `month` seen from `reference`.
///
/// The current month counts as upcoming; earlier months roll to next year.
pub fn resolve_year(month: u32, reference: NaiveDate) -> i32 {
    if month >= reference.month() {
        reference.year()
    } else {
        reference.year() + 1
    }
}

/// First Monday on or after the 1st of the month.
pub fn first_monday(year: i32, month: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let offset = (7 - first.weekday().num_days_from_monday()) % 7;
    first.checked_add_days(Days::new(u64::from(offset)))
}

/// Monday of the `ordinal`-th week of a month, clamped to the last Monday
/// inside the month. Returns the Monday and the ordinal actually used.
fn ordinal_week_monday(year: i32, month: u32, ordinal: u32) -> Option<(NaiveDate, u32)> {
    let first = first_monday(year, month)?;
    let mut used = ordinal.max(1);
    loop {
        let monday = first.checked_add_days(Days::new(7 * u64::from(used - 1)));
        match monday {
            Some(monday) if monday.month() == month => return Some((monday, used)),
            _ if used == 1 => return Some((first, 1)),
            _ => used -= 1,
        }
    }
}

/// Infer the date range a goal refers to, relative to `reference`.
pub fn resolve_date_range(goal: &str, reference: NaiveDate) -> DateResolution {
    let month = MONTH_RE
        .captures(goal)
        .and_then(|caps| month_number(&caps[1]));
    let ordinal = ORDINAL_WEEK_RE
        .captures(goal)
        .and_then(|caps| ordinal_number(&caps[1]));

    if let (Some(month), Some(ordinal)) = (month, ordinal) {
        let year = resolve_year(month, reference);
        if let Some((monday, used)) = ordinal_week_monday(year, month, ordinal) {
            let ambiguity = (used != ordinal).then_some(DateAmbiguity::WeekClamped {
                requested: ordinal,
                used,
            });
            return DateResolution {
                range: DateRange::week_starting(monday),
                ambiguity,
            };
        }
    }

    if TODAY_RE.is_match(goal) {
        return DateResolution::exact(DateRange::day(reference));
    }

    // Past the end of the calendar "next week" collapses to the current one.
    if WEEK_RE.is_match(goal) && NEXT_RE.is_match(goal) {
        let next = reference.checked_add_days(Days::new(7)).unwrap_or(reference);
        return DateResolution::exact(DateRange::week_of(next));
    }

    // "this week", bare "week", and anything unrecognized.
    DateResolution::exact(DateRange::week_of(reference))
}

/// [`resolve_date_range`] for a timestamp reference.
pub fn resolve_date_range_at(goal: &str, reference: NaiveDateTime) -> DateResolution {
    resolve_date_range(goal, reference.date())
}
