//! `Tool` adapter for tools hosted by the toolkit service.

use async_trait::async_trait;
use serde_json::Value;

use mailgate_tool_runtime::tool::{Tool, ToolContext, ToolDefinition, ToolError, ToolResult};

use crate::client::ToolkitClient;
use crate::types::ToolSpec;

/// A remote tool that forwards execution to the toolkit service on behalf
/// of the context's user.
pub struct RemoteTool {
    spec: ToolSpec,
    client: ToolkitClient,
}

impl RemoteTool {
    pub fn new(spec: ToolSpec, client: ToolkitClient) -> Self {
        Self { spec, client }
    }
}

#[async_trait]
impl Tool for RemoteTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::from(&self.spec)
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolResult, ToolError> {
        let user_id = context.user_id.as_deref().unwrap_or_default();
        let response = self
            .client
            .execute(&self.spec.qualified_name(), input, user_id)
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        let failed = response.success == Some(false);
        let (value, error) = match response.output {
            Some(output) => (output.value, output.error),
            None => (None, None),
        };

        if let Some(error) = error {
            return Ok(ToolResult {
                tool_call_id: String::new(), // Set by caller
                content: error.message,
                is_error: true,
            });
        }

        let content = match value {
            Some(Value::String(text)) => text,
            Some(other) => other.to_string(),
            None => String::new(),
        };

        Ok(ToolResult {
            tool_call_id: String::new(),
            content,
            is_error: failed,
        })
    }
}
