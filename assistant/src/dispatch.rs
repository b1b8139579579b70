//! Tool dispatch: the single place where capability errors become [`ToolResult`]s.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::{debug, info, instrument, warn};

use crate::core::types::{Arguments, ToolResult};
use crate::tools::ToolRegistry;

/// Invokes registered capabilities by name.
///
/// Never retries and never returns an error: not-found, refused, failed and
/// panicking invocations all come back as failed results.
pub struct Dispatcher<'a> {
    registry: &'a ToolRegistry,
    approve_destructive: bool,
}

impl<'a> Dispatcher<'a> {
    pub fn new(registry: &'a ToolRegistry, approve_destructive: bool) -> Self {
        Self {
            registry,
            approve_destructive,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        self.registry
    }

    #[instrument(skip_all, fields(tool = %tool))]
    pub fn invoke(&self, tool: &str, args: &Arguments) -> ToolResult {
        let Some(capability) = self.registry.get(tool) else {
            warn!("tool not registered");
            return ToolResult::failure(tool, format!("tool not found: {tool}"));
        };

        if capability.destructive() && !self.approve_destructive {
            info!("refusing destructive tool without approval");
            return ToolResult::failure(
                tool,
                format!("{tool} requires approval (set approve_destructive to allow it)"),
            );
        }

        debug!(arg_count = args.len(), "invoking tool");
        match catch_unwind(AssertUnwindSafe(|| capability.invoke(args))) {
            Ok(Ok(payload)) => {
                debug!(payload_keys = payload.len(), "tool succeeded");
                ToolResult::ok(tool, payload)
            }
            Ok(Err(err)) => {
                warn!(err = %format!("{err:#}"), "tool failed");
                ToolResult::failure(tool, format!("{err:#}"))
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!(panic = %message, "tool panicked");
                ToolResult::failure(tool, format!("{tool} panicked: {message}"))
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(text) = panic.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = panic.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FailingCapability, PanickingCapability, StaticCapability};
    use serde_json::json;

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(StaticCapability::new("count", json!({ "returned": 5, "total": 50 })));
        registry.register(FailingCapability::new("broken", "backend unavailable"));
        registry.register(PanickingCapability::new("explodes"));
        registry.register(StaticCapability::new("wipe", json!({ "ok": true })).marked_destructive());
        registry
    }

    #[test]
    fn unknown_tool_is_a_failure() {
        let registry = registry();
        let result = Dispatcher::new(&registry, false).invoke("missing", &Arguments::new());
        assert!(!result.success);
        assert_eq!(result.error_message.as_deref(), Some("tool not found: missing"));
    }

    #[test]
    fn success_carries_payload() {
        let registry = registry();
        let result = Dispatcher::new(&registry, false).invoke("count", &Arguments::new());
        assert!(result.success);
        assert_eq!(result.payload.get("total"), Some(&json!(50)));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn errors_become_failures() {
        let registry = registry();
        let result = Dispatcher::new(&registry, false).invoke("broken", &Arguments::new());
        assert!(!result.success);
        assert!(
            result
                .error_message
                .as_deref()
                .is_some_and(|m| m.contains("backend unavailable"))
        );
    }

    #[test]
    fn panics_become_failures() {
        let registry = registry();
        let result = Dispatcher::new(&registry, false).invoke("explodes", &Arguments::new());
        assert!(!result.success);
        assert!(
            result
                .error_message
                .as_deref()
                .is_some_and(|m| m.contains("explodes panicked"))
        );
    }

    #[test]
    fn destructive_tools_need_approval() {
        let registry = registry();
        let refused = Dispatcher::new(&registry, false).invoke("wipe", &Arguments::new());
        assert!(!refused.success);
        assert!(
            refused
                .error_message
                .as_deref()
                .is_some_and(|m| m.contains("requires approval"))
        );

        let allowed = Dispatcher::new(&registry, true).invoke("wipe", &Arguments::new());
        assert!(allowed.success);
    }
}
