//! Translation between provider-agnostic conversation types and the OpenAI API format.

use serde_json::{json, Value};

use mailgate_tool_runtime::{
    conversation::ConversationMessage,
    provider::LlmError,
    stream::{StopReason, StreamEvent},
    tool::ToolDefinition,
};

/// Translate a [`ToolDefinition`] into the OpenAI function-tool format.
pub(super) fn tool_definition_to_openai(tool: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.input_schema,
        }
    })
}

/// Translate a [`ConversationMessage`] into an OpenAI chat message.
pub(super) fn message_to_openai(msg: &ConversationMessage) -> Value {
    match msg {
        ConversationMessage::User(text) => json!({
            "role": "user",
            "content": text,
        }),
        ConversationMessage::Assistant(content) => {
            let mut message = json!({
                "role": "assistant",
                "content": content.text,
            });
            if !content.tool_calls.is_empty() {
                let calls: Vec<Value> = content
                    .tool_calls
                    .iter()
                    .map(|tc| {
                        json!({
                            "id": tc.id,
                            "type": "function",
                            "function": {
                                "name": tc.name,
                                "arguments": tc.input.to_string(),
                            }
                        })
                    })
                    .collect();
                message["tool_calls"] = json!(calls);
            }
            message
        }
        ConversationMessage::ToolResult(result) => json!({
            "role": "tool",
            "tool_call_id": result.tool_call_id,
            "content": result.content,
        }),
    }
}

/// Build the full `messages` array, system prompt first.
pub(super) fn messages_to_openai(
    system_prompt: Option<&str>,
    messages: &[ConversationMessage],
) -> Vec<Value> {
    let mut out = Vec::with_capacity(messages.len() + 1);
    if let Some(system) = system_prompt {
        out.push(json!({"role": "system", "content": system}));
    }
    out.extend(messages.iter().map(message_to_openai));
    out
}

pub(super) fn stop_reason_from_openai(finish_reason: Option<&str>) -> StopReason {
    match finish_reason {
        Some("tool_calls") | Some("function_call") => StopReason::ToolUse,
        Some("length") => StopReason::MaxTokens,
        Some("content_filter") => StopReason::StopSequence,
        _ => StopReason::EndTurn,
    }
}

/// Turn a complete chat-completions response into the event sequence a
/// streaming provider would have produced.
pub(super) fn response_to_events(resp: &Value) -> Result<Vec<StreamEvent>, LlmError> {
    let choice = resp["choices"]
        .get(0)
        .ok_or_else(|| LlmError::InvalidResponse("missing choices[0]".into()))?;
    let message = &choice["message"];
    let mut events = Vec::new();

    if let Some(text) = message["content"].as_str() {
        if !text.is_empty() {
            events.push(StreamEvent::TextDelta {
                text: text.to_string(),
            });
        }
    }

    if let Some(calls) = message["tool_calls"].as_array() {
        for call in calls {
            let id = call["id"]
                .as_str()
                .ok_or_else(|| LlmError::InvalidResponse("tool call without id".into()))?
                .to_string();
            let name = call["function"]["name"]
                .as_str()
                .ok_or_else(|| LlmError::InvalidResponse("tool call without name".into()))?
                .to_string();
            let arguments = call["function"]["arguments"]
                .as_str()
                .unwrap_or("{}")
                .to_string();

            events.push(StreamEvent::ToolCallStart {
                id: id.clone(),
                name,
            });
            events.push(StreamEvent::ToolCallDelta {
                id: id.clone(),
                arguments_delta: arguments,
            });
            events.push(StreamEvent::ToolCallEnd { id });
        }
    }

    events.push(StreamEvent::MessageEnd {
        stop_reason: stop_reason_from_openai(choice["finish_reason"].as_str()),
    });
    Ok(events)
}
