use serde::{Deserialize, Serialize};

/// Events emitted while a turn is processed.
///
/// Most come from the model provider (translated from the vendor format in
/// crates/llm); the loop adds its own events for tool outcomes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum StreamEvent {
    /// A chunk of text from the assistant
    TextDelta { text: String },
    /// Start of a tool call (LLM wants to execute a tool)
    ToolCallStart { id: String, name: String },
    /// Incremental JSON argument data for a tool call
    ToolCallDelta { id: String, arguments_delta: String },
    /// Tool call arguments are complete
    ToolCallEnd { id: String },
    /// A tool ran and produced a result
    ToolResult {
        id: String,
        name: String,
        content: String,
        is_error: bool,
    },
    /// The user declined a sensitive tool call; the turn was cancelled
    ToolCallDenied { id: String, name: String },
    /// The entire message is complete
    MessageEnd { stop_reason: StopReason },
    /// An error occurred during streaming
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// Normal end of response
    EndTurn,
    /// Model wants to use tools
    ToolUse,
    /// Hit max tokens limit
    MaxTokens,
    /// Stopped by stop sequence
    StopSequence,
}
