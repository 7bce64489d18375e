pub mod openai_tool_provider;
