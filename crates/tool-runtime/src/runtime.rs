use crate::conversation::{AssistantContent, Conversation};
use crate::gate::UserDeniedToolCall;
use crate::hooks::{AgentHooks, NoopHooks};
use crate::provider::{LlmError, ToolAwareLlmProvider};
use crate::registry::ToolRegistry;
use crate::stream::{StopReason, StreamEvent};
use crate::tool::{ToolCall, ToolContext, ToolError, ToolResult};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnStatus {
    /// The model produced its final answer.
    Completed,
    /// The user denied a sensitive tool call; the denied call was replaced
    /// by the denial turns.
    Cancelled { tool_name: String },
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub events: Vec<StreamEvent>,
    pub status: TurnStatus,
}

impl TurnOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self.status, TurnStatus::Cancelled { .. })
    }
}

/// The core agentic loop that orchestrates LLM ↔ Tool execution.
///
/// Flow: User → LLM → ToolCalls → Execute → Results → LLM → ... → Final Text
///
/// Tool calls within a turn run one after another. Sensitive tools are
/// expected to be registered already wrapped by the confirmation gate, so a
/// denial arrives here as [`ToolError::UserDenied`].
pub struct AgenticLoop {
    provider: Arc<dyn ToolAwareLlmProvider>,
    registry: Arc<ToolRegistry>,
    hooks: Arc<dyn AgentHooks>,
    max_iterations: usize,
    temperature: f32,
    max_tokens: u32,
}

impl AgenticLoop {
    pub fn new(provider: Arc<dyn ToolAwareLlmProvider>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            registry,
            hooks: Arc::new(NoopHooks),
            max_iterations: 10,
            temperature: 0.0,
            max_tokens: 4096,
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn AgentHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Run a single user turn through the agentic loop.
    ///
    /// A denied tool call ends the turn. Earlier iterations stay in the
    /// history; the denied iteration keeps only the calls that already ran,
    /// and the denial turns are appended after them.
    pub async fn run(
        &self,
        conversation: &mut Conversation,
        user_message: String,
        tool_context: &ToolContext,
    ) -> Result<TurnOutcome, AgenticLoopError> {
        self.hooks.on_turn_start(&user_message);
        conversation.add_user_message(user_message);
        let mut all_events = Vec::new();

        for iteration in 0..self.max_iterations {
            debug!(iteration, "Starting agentic loop iteration");

            let tools = self.registry.list();

            // Stream LLM response
            let mut stream = self
                .provider
                .stream_with_tools(
                    conversation.messages().to_vec(),
                    conversation.system_prompt().map(String::from),
                    tools,
                    self.temperature,
                    self.max_tokens,
                )
                .await
                .map_err(AgenticLoopError::LlmError)?;

            // Collect events from this turn
            let mut text_parts = Vec::new();
            let mut tool_calls: Vec<ToolCall> = Vec::new();
            let mut current_tool_args = String::new();
            let mut current_tool_id = String::new();
            let mut current_tool_name = String::new();
            let mut stop_reason = StopReason::EndTurn;

            while let Some(event_result) = stream.next().await {
                let event = event_result.map_err(AgenticLoopError::LlmError)?;
                match &event {
                    StreamEvent::TextDelta { text } => {
                        text_parts.push(text.clone());
                    }
                    StreamEvent::ToolCallStart { id, name } => {
                        current_tool_id = id.clone();
                        current_tool_name = name.clone();
                        current_tool_args.clear();
                    }
                    StreamEvent::ToolCallDelta { arguments_delta, .. } => {
                        current_tool_args.push_str(arguments_delta);
                    }
                    StreamEvent::ToolCallEnd { .. } => {
                        let input = parse_arguments(&current_tool_name, &current_tool_args);
                        tool_calls.push(ToolCall {
                            id: current_tool_id.clone(),
                            name: current_tool_name.clone(),
                            input,
                        });
                    }
                    StreamEvent::MessageEnd { stop_reason: reason } => {
                        stop_reason = reason.clone();
                    }
                    StreamEvent::Error { message } => {
                        warn!(message, "Stream error");
                    }
                    StreamEvent::ToolResult { .. } | StreamEvent::ToolCallDenied { .. } => {}
                }
                all_events.push(event);
            }

            let text = if text_parts.is_empty() {
                None
            } else {
                Some(text_parts.join(""))
            };
            let iteration_start = conversation.checkpoint();
            conversation.add_assistant_response(AssistantContent {
                text: text.clone(),
                tool_calls: tool_calls.clone(),
            });

            if tool_calls.is_empty() {
                info!(iteration, ?stop_reason, "Agentic loop complete");
                self.hooks.on_turn_end();
                return Ok(TurnOutcome {
                    events: all_events,
                    status: TurnStatus::Completed,
                });
            }

            info!(count = tool_calls.len(), "Executing tool calls");
            match self
                .execute_tool_calls(&tool_calls, tool_context, &mut all_events)
                .await
            {
                Ok(results) => {
                    for result in results {
                        conversation.add_tool_result(result);
                    }
                }
                Err(DeniedBatch { completed, denied }) => {
                    info!(
                        tool = %denied.tool_name,
                        reason = %denied.reason,
                        completed = completed.len(),
                        "Turn cancelled by user"
                    );
                    self.hooks.on_tool_denied(&denied.tool_name);
                    conversation.rollback(iteration_start);
                    if !completed.is_empty() {
                        // Calls that already ran stay on record with their results.
                        conversation.add_assistant_response(AssistantContent {
                            text,
                            tool_calls: tool_calls[..completed.len()].to_vec(),
                        });
                        for result in completed {
                            conversation.add_tool_result(result);
                        }
                    }
                    conversation.record_denial(&denied.tool_name);
                    self.hooks.on_turn_end();
                    return Ok(TurnOutcome {
                        events: all_events,
                        status: TurnStatus::Cancelled {
                            tool_name: denied.tool_name,
                        },
                    });
                }
            }
        }

        warn!(max = self.max_iterations, "Agentic loop hit iteration limit");
        self.hooks.on_turn_end();
        Err(AgenticLoopError::MaxIterations(self.max_iterations))
    }

    /// Execute tool calls in order. Stops at the first denial.
    async fn execute_tool_calls(
        &self,
        tool_calls: &[ToolCall],
        context: &ToolContext,
        events: &mut Vec<StreamEvent>,
    ) -> Result<Vec<ToolResult>, DeniedBatch> {
        let mut results = Vec::with_capacity(tool_calls.len());

        for call in tool_calls {
            let result = match self.registry.get(&call.name) {
                Some(tool) => {
                    self.hooks.on_tool_start(&call.name);
                    let result = match tool.execute(call.input.clone(), context).await {
                        Ok(mut result) => {
                            result.tool_call_id = call.id.clone();
                            result
                        }
                        Err(ToolError::UserDenied(denied)) => {
                            events.push(StreamEvent::ToolCallDenied {
                                id: call.id.clone(),
                                name: call.name.clone(),
                            });
                            return Err(DeniedBatch {
                                completed: results,
                                denied,
                            });
                        }
                        Err(e) => ToolResult {
                            tool_call_id: call.id.clone(),
                            content: format!("Tool error: {}", e),
                            is_error: true,
                        },
                    };
                    self.hooks.on_tool_end(&call.name, &result);
                    result
                }
                None => {
                    warn!(tool = %call.name, "Model requested a tool that is not registered");
                    ToolResult {
                        tool_call_id: call.id.clone(),
                        content: format!("Unknown tool: {}", call.name),
                        is_error: true,
                    }
                }
            };

            events.push(StreamEvent::ToolResult {
                id: call.id.clone(),
                name: call.name.clone(),
                content: result.content.clone(),
                is_error: result.is_error,
            });
            results.push(result);
        }

        Ok(results)
    }
}

/// A batch of tool calls cut short by a denial. `completed` holds the
/// results of the calls that ran before it, in call order.
struct DeniedBatch {
    completed: Vec<ToolResult>,
    denied: UserDeniedToolCall,
}

/// Parse accumulated tool-call arguments; empty or malformed JSON becomes `{}`.
fn parse_arguments(tool_name: &str, raw: &str) -> serde_json::Value {
    if raw.trim().is_empty() {
        return serde_json::json!({});
    }
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!(tool = %tool_name, error = %e, "Malformed tool call arguments");
        serde_json::json!({})
    })
}

#[derive(Debug, thiserror::Error)]
pub enum AgenticLoopError {
    #[error("LLM error: {0}")]
    LlmError(#[from] LlmError),
    #[error("Max iterations ({0}) exceeded")]
    MaxIterations(usize),
}
