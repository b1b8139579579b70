//! Calendar capabilities over a [`CalendarService`] backend.

use std::rc::Rc;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::core::params::DEFAULT_CALENDAR;
use crate::core::tool_ids;
use crate::core::types::{Arguments, Payload};
use crate::tools::Capability;
use crate::tools::args::{optional_str, optional_u64, required_str};

const DEFAULT_MAX_RESULTS: u64 = 10;
const MAX_RESULTS_CAP: u64 = 100;
const UNTITLED_EVENT: &str = "Untitled event";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarInfo {
    pub id: String,
    pub summary: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

/// All-day date or a specific (UTC) date-time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventTime {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl EventTime {
    /// Earliest instant covered by this time.
    pub fn starts_at(&self) -> NaiveDateTime {
        match self {
            EventTime::Date(date) => date.and_time(NaiveTime::MIN),
            EventTime::DateTime(at) => *at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub calendar_id: String,
    pub summary: String,
    pub start: EventTime,
    pub end: EventTime,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
}

/// Filter for [`CalendarService::events`]. Bounds are inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    pub calendar_id: String,
    pub time_min: Option<NaiveDateTime>,
    pub time_max: Option<NaiveDateTime>,
    pub search_text: Option<String>,
    pub max_results: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub calendar_id: String,
    pub summary: String,
    pub start: EventTime,
    pub end: EventTime,
    pub description: Option<String>,
    pub location: Option<String>,
}

/// Calendar backend. HTTP/OAuth implementations live outside this crate.
pub trait CalendarService {
    fn calendars(&self) -> Result<Vec<CalendarInfo>>;

    /// Events ordered by start time.
    fn events(&self, query: &EventQuery) -> Result<Vec<Event>>;

    fn insert_event(&self, event: &NewEvent) -> Result<Event>;

    fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<()>;
}

fn strip_utc_suffix(raw: &str) -> &str {
    raw.trim().trim_end_matches('Z')
}

fn parse_date_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = strip_utc_suffix(raw);
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// Parse `YYYY-MM-DD` as an all-day date, anything else as a date-time.
pub fn parse_event_time(raw: &str) -> Result<EventTime> {
    let trimmed = strip_utc_suffix(raw);
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(EventTime::Date(date));
    }
    parse_date_time(trimmed)
        .map(EventTime::DateTime)
        .ok_or_else(|| anyhow!("invalid event time '{raw}' (expected YYYY-MM-DD or YYYY-MM-DDTHH:MM[:SS])"))
}

/// Which end of a range a bare date widens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Start,
    End,
}

/// Parse a range bound; a bare date covers the whole day.
pub fn parse_bound(raw: &str, bound: Bound) -> Result<NaiveDateTime> {
    match parse_event_time(raw)? {
        EventTime::DateTime(at) => Ok(at),
        EventTime::Date(date) => {
            let time = match bound {
                Bound::Start => NaiveTime::MIN,
                Bound::End => NaiveTime::from_hms_opt(23, 59, 59)
                    .ok_or_else(|| anyhow!("invalid end-of-day time"))?,
            };
            Ok(date.and_time(time))
        }
    }
}

fn into_payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        _ => Payload::new(),
    }
}

fn calendar_id(args: &Arguments) -> Result<String> {
    Ok(optional_str(args, "calendar_id")?
        .unwrap_or(DEFAULT_CALENDAR)
        .to_string())
}

pub struct ListCalendars {
    service: Rc<dyn CalendarService>,
}

impl ListCalendars {
    pub fn new(service: Rc<dyn CalendarService>) -> Self {
        Self { service }
    }
}

impl Capability for ListCalendars {
    fn name(&self) -> &str {
        tool_ids::LIST_CALENDARS
    }

    fn description(&self) -> &str {
        "List all available calendars."
    }

    fn invoke(&self, _args: &Arguments) -> Result<Payload> {
        let calendars = self.service.calendars().context("list calendars")?;
        Ok(into_payload(json!({
            "total": calendars.len(),
            "calendars": calendars,
        })))
    }
}

/// Query events by calendar, time range and search text.
pub struct QueryEvents {
    service: Rc<dyn CalendarService>,
}

impl QueryEvents {
    pub fn new(service: Rc<dyn CalendarService>) -> Self {
        Self { service }
    }
}

impl Capability for QueryEvents {
    fn name(&self) -> &str {
        tool_ids::QUERY_EVENTS
    }

    fn description(&self) -> &str {
        "Query calendar events. Arguments: calendar_id (default primary), time_min and \
         time_max (ISO 8601 such as 2025-12-26, inclusive), search_text, max_results (1-100)."
    }

    fn invoke(&self, args: &Arguments) -> Result<Payload> {
        let calendar_id = calendar_id(args)?;
        let time_min = optional_str(args, "time_min")?
            .map(|raw| parse_bound(raw, Bound::Start))
            .transpose()?;
        let time_max = optional_str(args, "time_max")?
            .map(|raw| parse_bound(raw, Bound::End))
            .transpose()?;
        if let (Some(min), Some(max)) = (time_min, time_max)
            && min > max
        {
            bail!("time_min {min} is after time_max {max}");
        }
        let max_results = optional_u64(args, "max_results")?
            .unwrap_or(DEFAULT_MAX_RESULTS)
            .clamp(1, MAX_RESULTS_CAP);

        let query = EventQuery {
            calendar_id: calendar_id.clone(),
            time_min,
            time_max,
            search_text: optional_str(args, "search_text")?.map(str::to_string),
            max_results: max_results as u32,
        };
        let events = self.service.events(&query).context("query events")?;

        let returned = events.len() as u64;
        let summary = if returned < max_results {
            format!("Found {returned} events total")
        } else {
            format!("Found {returned} events (showing {returned} of possibly more)")
        };

        Ok(into_payload(json!({
            "calendar_id": calendar_id,
            "returned": returned,
            "summary": summary,
            "events": events,
        })))
    }
}

pub struct CreateEvent {
    service: Rc<dyn CalendarService>,
}

impl CreateEvent {
    pub fn new(service: Rc<dyn CalendarService>) -> Self {
        Self { service }
    }
}

impl Capability for CreateEvent {
    fn name(&self) -> &str {
        tool_ids::CREATE_EVENT
    }

    fn description(&self) -> &str {
        "Create a calendar event. Arguments: summary, start_time, end_time (YYYY-MM-DD for \
         all-day or YYYY-MM-DDTHH:MM[:SS]), calendar_id, description, location."
    }

    fn invoke(&self, args: &Arguments) -> Result<Payload> {
        let start = parse_event_time(required_str(args, "start_time")?)?;
        let end = match optional_str(args, "end_time")? {
            Some(raw) => parse_event_time(raw)?,
            None => start,
        };
        if end.starts_at() < start.starts_at() {
            bail!("event ends before it starts");
        }
        let new_event = NewEvent {
            calendar_id: calendar_id(args)?,
            summary: optional_str(args, "summary")?
                .unwrap_or(UNTITLED_EVENT)
                .to_string(),
            start,
            end,
            description: optional_str(args, "description")?.map(str::to_string),
            location: optional_str(args, "location")?.map(str::to_string),
        };
        let created = self
            .service
            .insert_event(&new_event)
            .context("create event")?;
        Ok(into_payload(json!({
            "event_id": created.id,
            "summary": created.summary,
            "start": created.start,
            "end": created.end,
            "status": "created",
        })))
    }
}

/// Delete an event. Cannot be undone.
pub struct DeleteEvent {
    service: Rc<dyn CalendarService>,
}

impl DeleteEvent {
    pub fn new(service: Rc<dyn CalendarService>) -> Self {
        Self { service }
    }
}

impl Capability for DeleteEvent {
    fn name(&self) -> &str {
        tool_ids::DELETE_EVENT
    }

    fn description(&self) -> &str {
        "Delete a calendar event by event_id (calendar_id defaults to primary)."
    }

    fn destructive(&self) -> bool {
        true
    }

    fn invoke(&self, args: &Arguments) -> Result<Payload> {
        let calendar_id = calendar_id(args)?;
        let event_id = required_str(args, "event_id")?;
        self.service
            .delete_event(&calendar_id, event_id)
            .with_context(|| format!("delete event {event_id}"))?;
        Ok(into_payload(json!({
            "event_id": event_id,
            "status": "deleted",
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::fixtures::CalendarFixture;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn event(id: &str, summary: &str, start: EventTime) -> Event {
        Event {
            id: id.to_string(),
            calendar_id: "primary".to_string(),
            summary: summary.to_string(),
            start,
            end: start,
            description: String::new(),
            location: String::new(),
        }
    }

    fn fixture() -> Rc<CalendarFixture> {
        let at = |d: u32, h: u32| {
            EventTime::DateTime(date(2025, 1, d).and_hms_opt(h, 0, 0).expect("time"))
        };
        Rc::new(CalendarFixture::with_events(vec![
            event("e1", "Work sync", at(20, 9)),
            event("e2", "Dentist", at(22, 15)),
            event("e3", "Work retro", at(27, 10)),
            event("e4", "Offsite", EventTime::Date(date(2025, 1, 26))),
        ]))
    }

    fn args(value: Value) -> Arguments {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn event_time_parsing() {
        assert_eq!(
            parse_event_time("2025-01-20").expect("date"),
            EventTime::Date(date(2025, 1, 20))
        );
        assert_eq!(
            parse_event_time("2025-01-20T10:00Z").expect("datetime"),
            EventTime::DateTime(date(2025, 1, 20).and_hms_opt(10, 0, 0).expect("time"))
        );
        assert!(parse_event_time("next tuesday").is_err());
    }

    #[test]
    fn date_bounds_cover_whole_days() {
        let end = parse_bound("2025-01-26", Bound::End).expect("end");
        assert_eq!(end, date(2025, 1, 26).and_hms_opt(23, 59, 59).expect("time"));
        let start = parse_bound("2025-01-20", Bound::Start).expect("start");
        assert_eq!(start, date(2025, 1, 20).and_time(NaiveTime::MIN));
    }

    #[test]
    fn query_events_in_week_range() {
        let tool = QueryEvents::new(fixture());
        let payload = tool
            .invoke(&args(json!({
                "calendar_id": "primary",
                "time_min": "2025-01-20",
                "time_max": "2025-01-26",
            })))
            .expect("query");
        assert_eq!(payload.get("returned"), Some(&json!(3)));
        assert!(!payload.contains_key("total"));
    }

    #[test]
    fn query_events_search_text() {
        let tool = QueryEvents::new(fixture());
        let payload = tool
            .invoke(&args(json!({ "search_text": "Work" })))
            .expect("query");
        assert_eq!(payload.get("returned"), Some(&json!(2)));
    }

    #[test]
    fn query_events_rejects_inverted_range() {
        let tool = QueryEvents::new(fixture());
        let err = tool
            .invoke(&args(json!({ "time_min": "2025-02-01", "time_max": "2025-01-01" })))
            .unwrap_err();
        assert!(err.to_string().contains("after time_max"));
    }

    #[test]
    fn create_then_delete_event() {
        let service = fixture();
        let create = CreateEvent::new(service.clone());
        let payload = create
            .invoke(&args(json!({
                "summary": "Planning",
                "start_time": "2025-01-21T10:00",
                "end_time": "2025-01-21T11:00",
            })))
            .expect("create");
        let id = payload
            .get("event_id")
            .and_then(Value::as_str)
            .expect("event id")
            .to_string();
        assert_eq!(payload.get("status"), Some(&json!("created")));

        let delete = DeleteEvent::new(service.clone());
        delete
            .invoke(&args(json!({ "event_id": id })))
            .expect("delete");
        let err = delete.invoke(&args(json!({ "event_id": id }))).unwrap_err();
        assert!(format!("{err:#}").contains("not found"));
    }

    #[test]
    fn create_rejects_end_before_start() {
        let create = CreateEvent::new(fixture());
        let err = create
            .invoke(&args(json!({
                "start_time": "2025-01-21T10:00",
                "end_time": "2025-01-21T09:00",
            })))
            .unwrap_err();
        assert!(err.to_string().contains("ends before"));
    }
}
