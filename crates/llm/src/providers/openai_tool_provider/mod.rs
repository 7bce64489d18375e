//! OpenAI chat-completions implementation of [`ToolAwareLlmProvider`].
//!
//! Translates between the Chat Completions API format (`tools`,
//! `tool_calls`, `tool` role messages) and the provider-agnostic
//! [`StreamEvent`] / [`ConversationMessage`] types.
//!
//! [`ToolAwareLlmProvider`]: mailgate_tool_runtime::provider::ToolAwareLlmProvider
//! [`StreamEvent`]: mailgate_tool_runtime::stream::StreamEvent
//! [`ConversationMessage`]: mailgate_tool_runtime::conversation::ConversationMessage

mod provider;
mod translate;

pub use self::provider::{OpenAiToolProvider, DEFAULT_BASE_URL, DEFAULT_MODEL};
