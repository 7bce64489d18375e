//! Tool runtime for the mail agent: tool abstractions, the confirmation gate
//! for sensitive calls, per-user tool authorization, and the agentic loop
//! that keeps the conversation coherent when a call is denied.

pub mod tool;
pub mod registry;
pub mod permission;
pub mod gate;
pub mod authorization;
pub mod conversation;
pub mod hooks;
pub mod runtime;
pub mod provider;
pub mod stream;

pub use tool::{Tool, ToolCall, ToolContext, ToolDefinition, ToolError, ToolResult};
pub use registry::{RegistryError, ToolRegistry};
pub use permission::{parse_confirmation, ConfirmationPrompter, SensitivityPolicy};
pub use gate::{
    ConfirmationGate, DenialReason, GuardedTool, InvocationState, PendingInvocation,
    UserDeniedToolCall, DEFAULT_CONFIRM_TIMEOUT,
};
pub use authorization::{
    register_authorized, AuthorizationClient, AuthorizationError, AuthorizationOutcome,
    AuthorizationService, AuthorizationStatus, ConsentPresenter, ConsentRequest,
    RegistrationError, RegistrationReport,
};
pub use conversation::{denial_turns, on_denial, AssistantContent, Conversation, ConversationMessage};
pub use hooks::{AgentHooks, NoopHooks, TracingHooks};
pub use runtime::{AgenticLoop, AgenticLoopError, TurnOutcome, TurnStatus};
pub use provider::{LlmError, ToolAwareLlmProvider};
pub use stream::{StopReason, StreamEvent};
