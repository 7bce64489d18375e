//! Model providers for the mail agent.

pub mod providers;

pub use providers::openai_tool_provider::OpenAiToolProvider;
