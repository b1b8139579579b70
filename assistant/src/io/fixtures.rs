//! JSON-file-backed mail and calendar services.
//!
//! These let the CLI and tests run offline. Search supports a small subset of
//! the usual mail query language: `from:`, `to:`, `subject:`, `in:`, `label:`,
//! `is:unread`, `is:read` and bare words.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::tools::calendar::{CalendarInfo, CalendarService, Event, EventQuery, EventTime, NewEvent};
use crate::tools::mail::{Label, MailService, Message, MessagePage, MessageSummary};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureMessage {
    pub id: String,
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub unread: bool,
}

impl FixtureMessage {
    fn summary(&self) -> MessageSummary {
        MessageSummary {
            id: self.id.clone(),
            from: self.from.clone(),
            to: self.to.clone(),
            subject: self.subject.clone(),
            date: self.date.clone(),
        }
    }

    fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l.eq_ignore_ascii_case(label))
    }

    fn matches(&self, term: &Term) -> bool {
        match term {
            Term::From(value) => contains_ci(&self.from, value),
            Term::To(value) => contains_ci(&self.to, value),
            Term::Subject(value) => contains_ci(&self.subject, value),
            Term::Label(value) => self.has_label(value),
            Term::Unread(unread) => self.unread == *unread,
            Term::Text(value) => {
                contains_ci(&self.subject, value)
                    || contains_ci(&self.body, value)
                    || contains_ci(&self.from, value)
            }
        }
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Term {
    From(String),
    To(String),
    Subject(String),
    Label(String),
    Unread(bool),
    Text(String),
}

fn parse_query(query: &str) -> Vec<Term> {
    query
        .split_whitespace()
        .map(|token| match token.split_once(':') {
            Some(("from", value)) => Term::From(value.to_string()),
            Some(("to", value)) => Term::To(value.to_string()),
            Some(("subject", value)) => Term::Subject(value.to_string()),
            Some(("in" | "label", value)) => Term::Label(value.to_string()),
            Some(("is", "unread")) => Term::Unread(true),
            Some(("is", "read")) => Term::Unread(false),
            _ => Term::Text(token.to_string()),
        })
        .collect()
}

/// In-memory mailbox. Sent messages are kept for the lifetime of the fixture.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MailFixture {
    pub messages: Vec<FixtureMessage>,
    pub labels: Vec<Label>,
    /// Multiplier applied to the match count to produce `result_size_estimate`.
    pub estimate_inflation: f64,
    #[serde(skip)]
    pub(crate) sent: RefCell<Vec<FixtureMessage>>,
}

impl Default for MailFixture {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            labels: Vec::new(),
            estimate_inflation: 1.0,
            sent: RefCell::new(Vec::new()),
        }
    }
}

impl MailFixture {
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let fixture: MailFixture =
            serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
        if !fixture.estimate_inflation.is_finite() || fixture.estimate_inflation < 0.0 {
            bail!(
                "estimate_inflation must be a non-negative number in {}",
                path.display()
            );
        }
        Ok(fixture)
    }

    /// Messages sent through this fixture, oldest first.
    pub fn sent(&self) -> Vec<FixtureMessage> {
        self.sent.borrow().clone()
    }

    fn all_messages(&self) -> Vec<FixtureMessage> {
        self.messages
            .iter()
            .chain(self.sent.borrow().iter())
            .cloned()
            .collect()
    }

    fn find(&self, id: &str) -> Result<FixtureMessage> {
        self.all_messages()
            .into_iter()
            .find(|m| m.id == id)
            .ok_or_else(|| anyhow!("message {id} not found"))
    }
}

impl MailService for MailFixture {
    fn list_messages(
        &self,
        query: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<MessagePage> {
        let terms = parse_query(query);
        let matched: Vec<String> = self
            .all_messages()
            .into_iter()
            .filter(|m| terms.iter().all(|term| m.matches(term)))
            .map(|m| m.id)
            .collect();

        let offset = match page_token {
            Some(token) => token
                .parse::<usize>()
                .with_context(|| format!("invalid page token '{token}'"))?,
            None => 0,
        };
        let page_size = page_size.max(1) as usize;
        let end = offset.saturating_add(page_size).min(matched.len());
        let ids = matched.get(offset..end).unwrap_or_default().to_vec();
        let next_page_token = (end < matched.len()).then(|| end.to_string());
        let result_size_estimate = (matched.len() as f64 * self.estimate_inflation).round() as u64;

        debug!(query, matched = matched.len(), offset, returned = ids.len(), "fixture search");
        Ok(MessagePage {
            ids,
            next_page_token,
            result_size_estimate,
        })
    }

    fn message_summary(&self, id: &str) -> Result<MessageSummary> {
        Ok(self.find(id)?.summary())
    }

    fn message(&self, id: &str) -> Result<Message> {
        let message = self.find(id)?;
        Ok(Message {
            summary: message.summary(),
            body: message.body,
        })
    }

    fn send(&self, to: &str, subject: &str, body: &str) -> Result<String> {
        let mut sent = self.sent.borrow_mut();
        let id = format!("sent-{}", sent.len() + 1);
        sent.push(FixtureMessage {
            id: id.clone(),
            from: "me".to_string(),
            to: to.to_string(),
            subject: subject.to_string(),
            date: String::new(),
            body: body.to_string(),
            labels: vec!["SENT".to_string()],
            unread: false,
        });
        Ok(id)
    }

    fn labels(&self) -> Result<Vec<Label>> {
        Ok(self.labels.clone())
    }
}

#[derive(Debug, Deserialize)]
struct CalendarFile {
    #[serde(default = "default_calendars")]
    calendars: Vec<CalendarInfo>,
    #[serde(default)]
    events: Vec<Event>,
}

fn default_calendars() -> Vec<CalendarInfo> {
    vec![CalendarInfo {
        id: "primary".to_string(),
        summary: "Primary".to_string(),
        primary: true,
        timezone: "UTC".to_string(),
    }]
}

/// In-memory calendar store. Inserted events get ids `evt-1`, `evt-2`, ...
#[derive(Debug)]
pub struct CalendarFixture {
    calendars: Vec<CalendarInfo>,
    events: RefCell<Vec<Event>>,
    next_id: Cell<u64>,
}

impl Default for CalendarFixture {
    fn default() -> Self {
        Self::with_events(Vec::new())
    }
}

impl CalendarFixture {
    pub fn with_events(events: Vec<Event>) -> Self {
        Self {
            calendars: default_calendars(),
            events: RefCell::new(events),
            next_id: Cell::new(1),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let file: CalendarFile =
            serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
        Ok(Self {
            calendars: file.calendars,
            events: RefCell::new(file.events),
            next_id: Cell::new(1),
        })
    }

    pub fn all_events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }
}

fn ends_at(time: &EventTime) -> NaiveDateTime {
    match time {
        EventTime::Date(date) => date.and_time(
            NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN),
        ),
        EventTime::DateTime(at) => *at,
    }
}

impl CalendarService for CalendarFixture {
    fn calendars(&self) -> Result<Vec<CalendarInfo>> {
        Ok(self.calendars.clone())
    }

    fn events(&self, query: &EventQuery) -> Result<Vec<Event>> {
        let mut events: Vec<Event> = self
            .events
            .borrow()
            .iter()
            .filter(|e| e.calendar_id == query.calendar_id)
            .filter(|e| query.time_min.is_none_or(|min| ends_at(&e.end) >= min))
            .filter(|e| query.time_max.is_none_or(|max| e.start.starts_at() <= max))
            .filter(|e| {
                query.search_text.as_deref().is_none_or(|text| {
                    contains_ci(&e.summary, text)
                        || contains_ci(&e.description, text)
                        || contains_ci(&e.location, text)
                })
            })
            .cloned()
            .collect();
        events.sort_by_key(|e| e.start.starts_at());
        events.truncate(query.max_results as usize);
        Ok(events)
    }

    fn insert_event(&self, event: &NewEvent) -> Result<Event> {
        if !self.calendars.iter().any(|c| c.id == event.calendar_id) {
            bail!("calendar {} not found", event.calendar_id);
        }
        let id = format!("evt-{}", self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);
        let created = Event {
            id,
            calendar_id: event.calendar_id.clone(),
            summary: event.summary.clone(),
            start: event.start,
            end: event.end,
            description: event.description.clone().unwrap_or_default(),
            location: event.location.clone().unwrap_or_default(),
        };
        self.events.borrow_mut().push(created.clone());
        Ok(created)
    }

    fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<()> {
        let mut events = self.events.borrow_mut();
        let index = events
            .iter()
            .position(|e| e.calendar_id == calendar_id && e.id == event_id)
            .ok_or_else(|| anyhow!("event {event_id} not found in calendar {calendar_id}"))?;
        events.remove(index);
        Ok(())
    }
}
