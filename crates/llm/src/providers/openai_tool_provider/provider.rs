//! [`ToolAwareLlmProvider`] trait implementation for the OpenAI chat-completions API.

use async_trait::async_trait;
use futures::stream::{self, Stream};
use serde_json::{json, Value};
use std::pin::Pin;
use tracing::debug;

use mailgate_tool_runtime::{
    conversation::ConversationMessage,
    provider::{LlmError, ToolAwareLlmProvider},
    stream::StreamEvent,
    tool::ToolDefinition,
};

use super::translate::{messages_to_openai, response_to_events, tool_definition_to_openai};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// OpenAI provider with tool-calling support.
///
/// Sends one non-streaming `/v1/chat/completions` request per loop iteration
/// and replays the answer as [`StreamEvent`]s.
pub struct OpenAiToolProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiToolProvider {
    /// Create a new OpenAI tool provider.
    ///
    /// # Arguments
    /// * `api_key` - OpenAI API key
    /// * `model` - Model name (e.g. `"gpt-4o"`)
    /// * `base_url` - API base URL (e.g. `"https://api.openai.com"`)
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn with_defaults(api_key: String) -> Self {
        Self::new(api_key, DEFAULT_MODEL.to_string(), DEFAULT_BASE_URL.to_string())
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ToolAwareLlmProvider for OpenAiToolProvider {
    async fn stream_with_tools(
        &self,
        messages: Vec<ConversationMessage>,
        system_prompt: Option<String>,
        tools: Vec<ToolDefinition>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>>, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let api_messages = messages_to_openai(system_prompt.as_deref(), &messages);
        let api_tools: Vec<Value> = tools.iter().map(tool_definition_to_openai).collect();

        let mut body = json!({
            "model": self.model,
            "messages": api_messages,
            "temperature": temperature,
            "max_tokens": max_tokens,
        });

        if !api_tools.is_empty() {
            body["tools"] = json!(api_tools);
        }

        debug!(model = %self.model, url = %url, tools = api_tools.len(), "starting OpenAI request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        let status = response.status().as_u16();

        if status != 200 {
            if status == 401 {
                return Err(LlmError::AuthError);
            }
            if status == 429 {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(30);
                return Err(LlmError::RateLimited {
                    retry_after_secs: retry_after,
                });
            }
            let body_text = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError {
                status,
                message: body_text,
            });
        }

        let resp: Value = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        let events = response_to_events(&resp)?;

        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}
