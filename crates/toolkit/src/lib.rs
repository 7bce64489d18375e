//! Client for the remote toolkit service.
//!
//! The service hosts the mail tools the agent can call, and it is also the
//! authorization service that decides whether a user may call a tool.
//!
//! # Architecture
//!
//! - **types**: wire types for tool specs, authorization and execution
//! - **client**: `ToolkitClient` over HTTP, implementing `AuthorizationService`
//! - **remote**: `RemoteTool`, a `Tool` adapter forwarding calls to the service
//! - **error**: unified error type
//!
//! # Usage
//!
//! ```no_run
//! use mailgate_toolkit::ToolkitClient;
//!
//! # async fn example() {
//! let client = ToolkitClient::new("https://api.arcade.dev", "arc_key");
//! let specs = client.list_tools("OutlookMail", 100).await.unwrap();
//! let tools = client.remote_tools(specs);
//! # }
//! ```

pub mod types;
pub mod client;
pub mod remote;
pub mod error;

#[cfg(test)]
mod testing;

pub use types::*;
pub use client::{ToolkitClient, DEFAULT_BASE_URL, DEFAULT_WAIT_SECS};
pub use remote::RemoteTool;
pub use error::ToolkitError;
