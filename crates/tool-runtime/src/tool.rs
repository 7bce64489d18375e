use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::gate::UserDeniedToolCall;

/// Describes a tool's interface for LLM consumption.
/// Maps to OpenAI's function format and the toolkit service's tool specs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name (e.g., "OutlookMail_ListEmails")
    pub name: String,
    /// Human-readable description for the LLM
    pub description: String,
    /// JSON Schema describing the expected input
    pub input_schema: Value,
}

/// Represents an LLM requesting execution of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique ID for this invocation (used to match results)
    pub id: String,
    /// Tool name to execute
    pub name: String,
    /// JSON input arguments
    pub input: Value,
}

/// Result of executing a tool, sent back to the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Must match the ToolCall id
    pub tool_call_id: String,
    /// Result content (text or structured)
    pub content: String,
    /// Whether this result represents an error
    pub is_error: bool,
}

/// Context passed to tool execution.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Identity of the user on whose behalf tools run. `None` is a valid,
    /// if degenerate, identity.
    pub user_id: Option<String>,
}

impl ToolContext {
    pub fn for_user(user_id: Option<String>) -> Self {
        Self { user_id }
    }
}

/// The primary extension point: all tools implement this trait.
///
/// Tools are object-safe, Send + Sync, and async.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool's definition (name, description, JSON Schema).
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with the given JSON input.
    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolResult, ToolError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
    #[error(transparent)]
    UserDenied(#[from] UserDeniedToolCall),
    #[error("Timeout after {0:?}")]
    Timeout(std::time::Duration),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl fmt::Display for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.description)
    }
}

/// In-process tools for exercising the runtime without a toolkit service.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// A tool that echoes its `message` input and counts invocations.
    pub struct RecordingTool {
        name: String,
        calls: AtomicUsize,
        users: Mutex<Vec<Option<String>>>,
    }

    impl RecordingTool {
        pub fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                calls: AtomicUsize::new(0),
                users: Mutex::new(Vec::new()),
            }
        }

        /// Number of times `execute` ran.
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// User identities seen by `execute`, in call order.
        pub fn users(&self) -> Vec<Option<String>> {
            self.users.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Tool for RecordingTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: self.name.clone(),
                description: format!("Recording tool '{}'. For testing.", self.name),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "message": { "type": "string" }
                    }
                }),
            }
        }

        async fn execute(
            &self,
            input: Value,
            context: &ToolContext,
        ) -> Result<ToolResult, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.users.lock().unwrap().push(context.user_id.clone());
            let message = input
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            Ok(ToolResult {
                tool_call_id: String::new(), // Set by caller
                content: format!("{}: {}", self.name, message),
                is_error: false,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::RecordingTool;
    use super::*;

    #[test]
    fn test_tool_call_serialization() {
        let call = ToolCall {
            id: "call_001".to_string(),
            name: "OutlookMail_ListEmails".to_string(),
            input: serde_json::json!({"limit": 5}),
        };
        let json = serde_json::to_string(&call).unwrap();
        let roundtrip: ToolCall = serde_json::from_str(&json).unwrap();
        assert_eq!(roundtrip.id, "call_001");
        assert_eq!(roundtrip.input["limit"], 5);
    }

    #[test]
    fn test_definition_display() {
        let def = ToolDefinition {
            name: "SendEmail".to_string(),
            description: "Send an email".to_string(),
            input_schema: serde_json::json!({"type": "object"}),
        };
        assert_eq!(def.to_string(), "SendEmail(Send an email)");
    }

    #[tokio::test]
    async fn test_recording_tool() {
        let tool = RecordingTool::new("ListEmails");
        let ctx = ToolContext::for_user(Some("alice@example.com".to_string()));
        let result = tool
            .execute(serde_json::json!({"message": "inbox"}), &ctx)
            .await
            .unwrap();
        assert_eq!(result.content, "ListEmails: inbox");
        assert_eq!(tool.calls(), 1);
        assert_eq!(tool.users(), vec![Some("alice@example.com".to_string())]);
    }
}
