//! Lifecycle callbacks fired by the agentic loop.

use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

use crate::tool::ToolResult;

/// Observer for turn and tool events. Every method defaults to a no-op.
pub trait AgentHooks: Send + Sync {
    fn on_turn_start(&self, _user_message: &str) {}

    fn on_turn_end(&self) {}

    fn on_tool_start(&self, _tool_name: &str) {}

    fn on_tool_end(&self, _tool_name: &str, _result: &ToolResult) {}

    fn on_tool_denied(&self, _tool_name: &str) {}
}

/// Hooks that do nothing.
pub struct NoopHooks;

impl AgentHooks for NoopHooks {}

/// Logs every event through `tracing`, numbered in the order it happened.
pub struct TracingHooks {
    display_name: String,
    counter: AtomicUsize,
}

impl TracingHooks {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            counter: AtomicUsize::new(0),
        }
    }

    /// Number of events seen so far.
    pub fn event_count(&self) -> usize {
        self.counter.load(Ordering::SeqCst)
    }

    fn next(&self) -> usize {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl AgentHooks for TracingHooks {
    fn on_turn_start(&self, _user_message: &str) {
        let event = self.next();
        info!(agent = %self.display_name, event, "Turn started");
    }

    fn on_turn_end(&self) {
        let event = self.next();
        info!(agent = %self.display_name, event, "Turn ended");
    }

    fn on_tool_start(&self, tool_name: &str) {
        let event = self.next();
        info!(agent = %self.display_name, event, tool = %tool_name, "Tool started");
    }

    fn on_tool_end(&self, tool_name: &str, result: &ToolResult) {
        let event = self.next();
        info!(
            agent = %self.display_name,
            event,
            tool = %tool_name,
            is_error = result.is_error,
            "Tool ended"
        );
    }

    fn on_tool_denied(&self, tool_name: &str) {
        let event = self.next();
        info!(agent = %self.display_name, event, tool = %tool_name, "Tool call denied by user");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_hooks_count_events() {
        let hooks = TracingHooks::new("mail");
        hooks.on_turn_start("hi");
        hooks.on_tool_start("ListEmails");
        hooks.on_tool_end(
            "ListEmails",
            &ToolResult {
                tool_call_id: "call_1".to_string(),
                content: "[]".to_string(),
                is_error: false,
            },
        );
        hooks.on_tool_denied("SendEmail");
        hooks.on_turn_end();
        assert_eq!(hooks.event_count(), 5);
    }
}
