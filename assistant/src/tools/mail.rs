//! Mail capabilities over a [`MailService`] backend.

use std::collections::BTreeSet;
use std::rc::Rc;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::core::tool_ids;
use crate::core::types::{Arguments, Payload};
use crate::tools::Capability;
use crate::tools::args::{optional_bool, optional_str, optional_u64, required_str};

/// Page size used when exhausting pagination for an exact count.
const COUNT_PAGE_SIZE: u32 = 100;
/// Upper bound on pages walked for one exact count.
const MAX_COUNT_PAGES: usize = 10_000;
const DEFAULT_MAX_RESULTS: u64 = 10;
const MAX_RESULTS_CAP: u64 = 100;

/// One page of message ids for a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePage {
    pub ids: Vec<String>,
    pub next_page_token: Option<String>,
    /// The service's cheap estimate of total matches. May be stale.
    pub result_size_estimate: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSummary {
    pub id: String,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(flatten)]
    pub summary: MessageSummary,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
}

/// Mail backend. HTTP/OAuth implementations live outside this crate.
pub trait MailService {
    fn list_messages(
        &self,
        query: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<MessagePage>;

    fn message_summary(&self, id: &str) -> Result<MessageSummary>;

    fn message(&self, id: &str) -> Result<Message>;

    /// Send a plain-text message. Returns the new message id.
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<String>;

    fn labels(&self) -> Result<Vec<Label>>;
}

fn into_payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        _ => Payload::new(),
    }
}

/// Search messages; optionally count matches exactly or by estimate.
pub struct QueryEmail {
    service: Rc<dyn MailService>,
}

impl QueryEmail {
    pub fn new(service: Rc<dyn MailService>) -> Self {
        Self { service }
    }

    fn count_all(&self, query: &str) -> Result<Payload> {
        let mut count = 0u64;
        let mut estimate = None;
        let mut token: Option<String> = None;
        for _ in 0..MAX_COUNT_PAGES {
            let page = self
                .service
                .list_messages(query, COUNT_PAGE_SIZE, token.as_deref())
                .context("list messages")?;
            estimate.get_or_insert(page.result_size_estimate);
            count += page.ids.len() as u64;
            match page.next_page_token {
                Some(next) => token = Some(next),
                None => {
                    let estimate = estimate.unwrap_or(count);
                    return Ok(into_payload(json!({
                        "query": query,
                        "count": count,
                        "returned": count,
                        "total": estimate,
                        "summary": format!("Found {count} emails matching query (accurate count)"),
                    })));
                }
            }
        }
        Err(anyhow!(
            "pagination did not finish after {MAX_COUNT_PAGES} pages"
        ))
    }

    fn count_only(&self, query: &str) -> Result<Payload> {
        let page = self
            .service
            .list_messages(query, 1, None)
            .context("list messages")?;
        let estimate = page.result_size_estimate;
        Ok(into_payload(json!({
            "query": query,
            "count": estimate,
            "count_note": "This is a service estimate and may be inaccurate. Use count_all for an exact count.",
            "summary": format!("Found {estimate} emails (estimate)"),
        })))
    }

    fn list(&self, query: &str, max_results: u64) -> Result<Payload> {
        let page = self
            .service
            .list_messages(query, max_results as u32, None)
            .context("list messages")?;
        let total = page.result_size_estimate;

        let mut emails = Vec::new();
        let mut senders = BTreeSet::new();
        for id in &page.ids {
            match self.service.message_summary(id) {
                Ok(summary) => {
                    senders.insert(summary.from.clone());
                    emails.push(summary);
                }
                Err(err) => debug!(id = %id, err = %err, "skipping unreadable message"),
            }
        }

        let returned = emails.len() as u64;
        let summary = if returned < total {
            format!("Found {returned} emails (showing {returned} of {total} total matching emails)")
        } else {
            format!("Found {returned} emails total")
        };

        Ok(into_payload(json!({
            "query": query,
            "returned": returned,
            "total": total,
            "summary": summary,
            "unique_senders": senders,
            "emails": emails,
        })))
    }
}

impl Capability for QueryEmail {
    fn name(&self) -> &str {
        tool_ids::QUERY_EMAIL
    }

    fn description(&self) -> &str {
        "Search emails by query string (from:, to:, subject:, in:, is:unread, is:read). \
         Optional max_results (1-100, default 10). count_all=true counts every match \
         exactly (slower); count_only=true returns the service estimate."
    }

    fn invoke(&self, args: &Arguments) -> Result<Payload> {
        let query = optional_str(args, "query")?.unwrap_or("");
        if optional_bool(args, "count_all")?.unwrap_or(false) {
            return self.count_all(query);
        }
        if optional_bool(args, "count_only")?.unwrap_or(false) {
            return self.count_only(query);
        }
        let max_results = optional_u64(args, "max_results")?
            .unwrap_or(DEFAULT_MAX_RESULTS)
            .clamp(1, MAX_RESULTS_CAP);
        self.list(query, max_results)
    }
}

/// Read one message in full.
pub struct ReadEmail {
    service: Rc<dyn MailService>,
}

impl ReadEmail {
    pub fn new(service: Rc<dyn MailService>) -> Self {
        Self { service }
    }
}

impl Capability for ReadEmail {
    fn name(&self) -> &str {
        tool_ids::READ_EMAIL
    }

    fn description(&self) -> &str {
        "Read the full content of an email by message_id (get ids from query_email first)."
    }

    fn invoke(&self, args: &Arguments) -> Result<Payload> {
        let id = required_str(args, "message_id")?;
        let message = self
            .service
            .message(id)
            .with_context(|| format!("read message {id}"))?;
        Ok(into_payload(serde_json::to_value(message)?))
    }
}

/// Send a plain-text email. Cannot be undone.
pub struct SendEmail {
    service: Rc<dyn MailService>,
}

impl SendEmail {
    pub fn new(service: Rc<dyn MailService>) -> Self {
        Self { service }
    }
}

impl Capability for SendEmail {
    fn name(&self) -> &str {
        tool_ids::SEND_EMAIL
    }

    fn description(&self) -> &str {
        "Send an email (to, subject, body). Sent emails cannot be unsent."
    }

    fn destructive(&self) -> bool {
        true
    }

    fn invoke(&self, args: &Arguments) -> Result<Payload> {
        let to = required_str(args, "to")?;
        let subject = required_str(args, "subject")?;
        let body = required_str(args, "body")?;
        let message_id = self
            .service
            .send(to, subject, body)
            .with_context(|| format!("send email to {to}"))?;
        Ok(into_payload(json!({
            "message_id": message_id,
            "to": to,
            "subject": subject,
            "status": "sent",
        })))
    }
}

/// List mailbox labels (folders and categories).
pub struct ListLabels {
    service: Rc<dyn MailService>,
}

impl ListLabels {
    pub fn new(service: Rc<dyn MailService>) -> Self {
        Self { service }
    }
}

impl Capability for ListLabels {
    fn name(&self) -> &str {
        tool_ids::LIST_LABELS
    }

    fn description(&self) -> &str {
        "List all mailbox labels (folders/categories)."
    }

    fn invoke(&self, _args: &Arguments) -> Result<Payload> {
        let labels = self.service.labels().context("list labels")?;
        Ok(into_payload(json!({
            "total": labels.len(),
            "labels": labels,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::fixtures::{FixtureMessage, MailFixture};

    fn message(id: &str, from: &str, unread: bool) -> FixtureMessage {
        FixtureMessage {
            id: id.to_string(),
            from: from.to_string(),
            to: "me@example.com".to_string(),
            subject: format!("subject {id}"),
            date: "2025-01-01".to_string(),
            body: format!("body {id}"),
            labels: vec!["INBOX".to_string()],
            unread,
        }
    }

    fn mailbox(count: usize, inflation: f64) -> Rc<MailFixture> {
        let messages = (0..count)
            .map(|i| message(&format!("m{i}"), "alice@example.com", i % 2 == 0))
            .collect();
        Rc::new(MailFixture {
            messages,
            estimate_inflation: inflation,
            ..MailFixture::default()
        })
    }

    fn args(value: Value) -> Arguments {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn count_all_walks_every_page() {
        let tool = QueryEmail::new(mailbox(250, 1.0));
        let payload = tool
            .invoke(&args(json!({ "query": "", "count_all": true })))
            .expect("count");
        assert_eq!(payload.get("count"), Some(&json!(250)));
        assert_eq!(payload.get("returned"), Some(&json!(250)));
        assert_eq!(payload.get("total"), Some(&json!(250)));
    }

    #[test]
    fn count_only_returns_estimate() {
        let tool = QueryEmail::new(mailbox(10, 3.0));
        let payload = tool
            .invoke(&args(json!({ "count_only": true })))
            .expect("count");
        assert_eq!(payload.get("count"), Some(&json!(30)));
        assert!(payload.contains_key("count_note"));
        assert!(!payload.contains_key("returned"));
    }

    #[test]
    fn listing_clamps_max_results_and_reports_totals() {
        let tool = QueryEmail::new(mailbox(300, 1.0));
        let payload = tool
            .invoke(&args(json!({ "query": "", "max_results": 500 })))
            .expect("list");
        assert_eq!(payload.get("returned"), Some(&json!(100)));
        assert_eq!(payload.get("total"), Some(&json!(300)));
        assert_eq!(payload.get("unique_senders"), Some(&json!(["alice@example.com"])));
    }

    #[test]
    fn listing_filters_by_query() {
        let tool = QueryEmail::new(mailbox(6, 1.0));
        let payload = tool
            .invoke(&args(json!({ "query": "is:unread" })))
            .expect("list");
        assert_eq!(payload.get("returned"), Some(&json!(3)));
    }

    #[test]
    fn send_requires_all_fields() {
        let tool = SendEmail::new(mailbox(0, 1.0));
        let err = tool
            .invoke(&args(json!({ "to": "bob@example.com", "subject": "hi" })))
            .unwrap_err();
        assert!(err.to_string().contains("'body'"));
        assert!(tool.destructive());
    }

    #[test]
    fn read_unknown_message_fails_with_context() {
        let tool = ReadEmail::new(mailbox(1, 1.0));
        let err = tool
            .invoke(&args(json!({ "message_id": "nope" })))
            .unwrap_err();
        assert!(format!("{err:#}").contains("read message nope"));

        let ok = tool
            .invoke(&args(json!({ "message_id": "m0" })))
            .expect("read");
        assert_eq!(ok.get("body"), Some(&json!("body m0")));
    }
}
