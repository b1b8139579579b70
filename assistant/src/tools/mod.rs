//! Capability interface and registry.
//!
//! A capability is a named operation invoked with structured arguments. The
//! [`ToolRegistry`] maps identifiers to capabilities; it is populated before a
//! run starts and only borrowed immutably while the loop runs.

pub mod args;
pub mod calendar;
pub mod mail;
pub mod noop;

use std::collections::BTreeMap;
use std::rc::Rc;

use anyhow::Result;
use serde::Serialize;
use tracing::warn;

use crate::core::types::{Arguments, Payload};
use crate::tools::calendar::{CalendarService, CreateEvent, DeleteEvent, ListCalendars, QueryEvents};
use crate::tools::mail::{ListLabels, MailService, QueryEmail, ReadEmail, SendEmail};
use crate::tools::noop::Noop;

/// A named, invocable operation.
pub trait Capability {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Whether invoking this capability has effects that cannot be undone.
    fn destructive(&self) -> bool {
        false
    }

    fn invoke(&self, args: &Arguments) -> Result<Payload>;
}

/// Catalog entry shown to planners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub destructive: bool,
}

/// Identifier → capability mapping.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Capability>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability under its own name, replacing any previous one.
    pub fn register<C: Capability + 'static>(&mut self, capability: C) {
        let name = capability.name().to_string();
        if self.tools.insert(name.clone(), Box::new(capability)).is_some() {
            warn!(tool = %name, "replaced previously registered tool");
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Capability> {
        self.tools.get(name).map(|tool| tool.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn catalog(&self) -> Vec<ToolInfo> {
        self.tools
            .values()
            .map(|tool| ToolInfo {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                destructive: tool.destructive(),
            })
            .collect()
    }
}

/// Registry with the no-op plus every mail and calendar capability.
pub fn standard_registry(
    mail: Rc<dyn MailService>,
    calendar: Rc<dyn CalendarService>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Noop);
    registry.register(QueryEmail::new(mail.clone()));
    registry.register(ReadEmail::new(mail.clone()));
    registry.register(SendEmail::new(mail.clone()));
    registry.register(ListLabels::new(mail));
    registry.register(ListCalendars::new(calendar.clone()));
    registry.register(QueryEvents::new(calendar.clone()));
    registry.register(CreateEvent::new(calendar.clone()));
    registry.register(DeleteEvent::new(calendar));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tool_ids;
    use crate::io::fixtures::{CalendarFixture, MailFixture};

    fn registry() -> ToolRegistry {
        standard_registry(
            Rc::new(MailFixture::default()),
            Rc::new(CalendarFixture::default()),
        )
    }

    #[test]
    fn standard_registry_covers_every_selectable_tool() {
        let registry = registry();
        for tool in tool_ids::SELECTABLE {
            assert!(registry.contains(tool), "missing {tool}");
        }
        assert!(registry.contains(tool_ids::NOOP));
        assert_eq!(registry.len(), tool_ids::SELECTABLE.len() + 1);
    }

    #[test]
    fn catalog_marks_destructive_tools() {
        let catalog = registry().catalog();
        let destructive: Vec<&str> = catalog
            .iter()
            .filter(|info| info.destructive)
            .map(|info| info.name.as_str())
            .collect();
        assert_eq!(destructive, vec![tool_ids::DELETE_EVENT, tool_ids::SEND_EMAIL]);
    }

    #[test]
    fn register_replaces_same_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Noop);
        registry.register(Noop);
        assert_eq!(registry.names(), vec![tool_ids::NOOP]);
    }
}
