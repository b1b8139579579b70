//! Stable identifiers for the built-in capabilities.

pub const QUERY_EMAIL: &str = "query_email";
pub const READ_EMAIL: &str = "read_email";
pub const SEND_EMAIL: &str = "send_email";
pub const LIST_LABELS: &str = "list_labels";
pub const LIST_CALENDARS: &str = "list_calendars";
pub const QUERY_EVENTS: &str = "query_events";
pub const CREATE_EVENT: &str = "create_event";
pub const DELETE_EVENT: &str = "delete_event";
pub use crate::core::types::NOOP_TOOL as NOOP;

/// Every tool the selector can return, in catalog order.
pub const SELECTABLE: &[&str] = &[
    QUERY_EMAIL,
    READ_EMAIL,
    SEND_EMAIL,
    LIST_LABELS,
    LIST_CALENDARS,
    QUERY_EVENTS,
    CREATE_EVENT,
    DELETE_EVENT,
];

pub fn is_selectable(tool: &str) -> bool {
    SELECTABLE.contains(&tool)
}
