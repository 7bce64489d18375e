//! HTTP client for the toolkit service.
//!
//! Covers tool discovery, the per-user authorization handshake and tool
//! execution. The client doubles as the [`AuthorizationService`] used by the
//! runtime's authorization client.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use mailgate_tool_runtime::authorization::{
    AuthorizationError, AuthorizationService, AuthorizationStatus,
};
use mailgate_tool_runtime::tool::Tool;

use crate::error::ToolkitError;
use crate::remote::RemoteTool;
use crate::types::*;

pub const DEFAULT_BASE_URL: &str = "https://api.arcade.dev";

/// How long a single status request asks the service to hold the
/// connection open while waiting for consent.
pub const DEFAULT_WAIT_SECS: u64 = 45;

/// Client for the toolkit service REST API.
#[derive(Clone)]
pub struct ToolkitClient {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
    /// Model-facing name to the name the service knows the tool by.
    service_names: Arc<RwLock<HashMap<String, String>>>,
}

impl ToolkitClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http: reqwest::Client::new(),
            service_names: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// List the tools of one toolkit.
    pub async fn list_tools(&self, toolkit: &str, limit: usize) -> Result<Vec<ToolSpec>, ToolkitError> {
        let url = format!("{}/v1/tools", self.base_url);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .query(&[("toolkit", toolkit.to_string()), ("limit", limit.to_string())])
            .send()
            .await?;

        let list: ListToolsResponse = decode(resp).await?;
        tracing::debug!(toolkit = %toolkit, count = list.items.len(), "Listed toolkit tools");
        Ok(list.items)
    }

    /// Fetch a single tool by its qualified name.
    pub async fn get_tool(&self, name: &str) -> Result<ToolSpec, ToolkitError> {
        let url = format!("{}/v1/tools/definition", self.base_url);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .query(&[("name", name)])
            .send()
            .await?;
        decode(resp).await
    }

    /// Collect tools from whole toolkits plus individually named tools,
    /// skipping duplicates.
    pub async fn discover(
        &self,
        toolkits: &[String],
        tools: &[String],
        limit: usize,
    ) -> Result<Vec<ToolSpec>, ToolkitError> {
        let mut seen = HashSet::new();
        let mut specs = Vec::new();

        for toolkit in toolkits {
            for spec in self.list_tools(toolkit, limit).await? {
                if seen.insert(spec.llm_name()) {
                    specs.push(spec);
                }
            }
        }
        for name in tools {
            let spec = self.get_tool(name).await?;
            if seen.insert(spec.llm_name()) {
                specs.push(spec);
            }
        }

        tracing::info!(count = specs.len(), "Tool discovery complete");
        Ok(specs)
    }

    /// Wrap discovered specs as runtime tools, remembering the service name
    /// behind each model-facing name.
    pub fn remote_tools(&self, specs: Vec<ToolSpec>) -> Vec<Arc<dyn Tool>> {
        if let Ok(mut names) = self.service_names.write() {
            for spec in &specs {
                names.insert(spec.llm_name(), spec.qualified_name());
            }
        }
        specs
            .into_iter()
            .map(|spec| Arc::new(RemoteTool::new(spec, self.clone())) as Arc<dyn Tool>)
            .collect()
    }

    /// Start authorization of `tool_name` (qualified) for `user_id`.
    pub async fn authorize(
        &self,
        tool_name: &str,
        user_id: &str,
    ) -> Result<AuthorizationResponse, ToolkitError> {
        let url = format!("{}/v1/tools/authorize", self.base_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&AuthorizeRequest {
                tool_name: tool_name.to_string(),
                user_id: user_id.to_string(),
            })
            .send()
            .await?;
        decode(resp).await
    }

    /// Poll an authorization. The service holds the request open for up to
    /// `wait_secs` while the status is still pending.
    pub async fn auth_status(
        &self,
        authorization_id: &str,
        wait_secs: u64,
    ) -> Result<AuthorizationResponse, ToolkitError> {
        let url = format!("{}/v1/auth/status", self.base_url);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .query(&[("id", authorization_id.to_string()), ("wait", wait_secs.to_string())])
            .send()
            .await?;
        decode(resp).await
    }

    /// Service name for a model-facing tool name. Tools not wrapped by
    /// [`Self::remote_tools`] fall back to `Toolkit_Tool` -> `Toolkit.Tool`.
    fn service_name(&self, tool_name: &str) -> String {
        self.service_names
            .read()
            .ok()
            .and_then(|names| names.get(tool_name).cloned())
            .unwrap_or_else(|| qualified_from_llm_name(tool_name))
    }

    /// Execute `tool_name` (qualified) on behalf of `user_id`.
    pub async fn execute(
        &self,
        tool_name: &str,
        input: Value,
        user_id: &str,
    ) -> Result<ExecuteResponse, ToolkitError> {
        tracing::debug!(tool = %tool_name, "Executing remote tool");
        let url = format!("{}/v1/tools/execute", self.base_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&ExecuteRequest {
                tool_name: tool_name.to_string(),
                input,
                user_id: user_id.to_string(),
            })
            .send()
            .await?;
        decode(resp).await
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ToolkitError> {
    let status = resp.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(ToolkitError::Unauthorized);
    }
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(ToolkitError::Api {
            status: status.as_u16(),
            message: body,
        });
    }
    serde_json::from_str(&body).map_err(|e| ToolkitError::InvalidResponse(e.to_string()))
}

fn to_status(resp: AuthorizationResponse) -> AuthorizationStatus {
    match resp.status {
        AuthStatus::Completed => AuthorizationStatus::Completed,
        AuthStatus::Failed => AuthorizationStatus::Failed {
            reason: "refused by the authorization service".to_string(),
        },
        AuthStatus::Pending | AuthStatus::NotStarted => match resp.id {
            Some(id) => AuthorizationStatus::Pending { id, url: resp.url },
            None => AuthorizationStatus::Failed {
                reason: "pending authorization without an id".to_string(),
            },
        },
    }
}

#[async_trait]
impl AuthorizationService for ToolkitClient {
    async fn request_authorization(
        &self,
        tool_name: &str,
        user_id: &str,
    ) -> Result<AuthorizationStatus, AuthorizationError> {
        let service_name = self.service_name(tool_name);
        match self.authorize(&service_name, user_id).await {
            Ok(resp) => Ok(to_status(resp)),
            Err(e) if e.is_client_error() => Err(AuthorizationError::Failed {
                tool_name: tool_name.to_string(),
                reason: e.to_string(),
            }),
            Err(e) => Err(AuthorizationError::ServiceUnavailable(e.to_string())),
        }
    }

    async fn wait_for_completion(
        &self,
        authorization_id: &str,
    ) -> Result<AuthorizationStatus, AuthorizationError> {
        match self.auth_status(authorization_id, DEFAULT_WAIT_SECS).await {
            Ok(resp) => Ok(to_status(resp)),
            Err(e) if e.is_client_error() => Ok(AuthorizationStatus::Failed {
                reason: e.to_string(),
            }),
            Err(e) => Err(AuthorizationError::ServiceUnavailable(e.to_string())),
        }
    }
}
