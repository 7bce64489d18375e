//! Human-in-the-loop confirmation gate.
//!
//! Sensitive tools are wrapped in a [`GuardedTool`] at registration time.
//! Every call to a guarded tool becomes a [`PendingInvocation`] that must be
//! explicitly approved before the wrapped tool runs:
//!
//! ```text
//! Requested ──(not sensitive)──────────────────────────► Executed
//! Requested ──► AwaitingApproval ──► Approved ─────────► Executed
//!                                └─► Denied ───────────► Cancelled
//! ```
//!
//! A denial surfaces as [`ToolError::UserDenied`]; the agentic loop turns it
//! into dialogue turns instead of a tool result.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::permission::{parse_confirmation, ConfirmationPrompter, SensitivityPolicy};
use crate::tool::{Tool, ToolContext, ToolDefinition, ToolError, ToolResult};

/// How long the gate waits for an answer before treating it as a denial.
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(120);

/// Lifecycle of a single tool call passing through the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Requested,
    AwaitingApproval,
    Approved,
    Denied,
    Executed,
    Cancelled,
}

impl InvocationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Executed | Self::Cancelled)
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        use InvocationState::*;
        matches!(
            (self, next),
            (Requested, Executed)
                | (Requested, AwaitingApproval)
                | (AwaitingApproval, Approved)
                | (AwaitingApproval, Denied)
                | (Approved, Executed)
                | (Denied, Cancelled)
        )
    }
}

/// One attempted tool call, from request until executed or cancelled.
#[derive(Debug, Clone)]
pub struct PendingInvocation {
    pub id: Uuid,
    pub tool_name: String,
    pub input: Value,
    pub user_id: Option<String>,
    state: InvocationState,
    approved: bool,
}

impl PendingInvocation {
    pub fn new(tool_name: impl Into<String>, input: Value, user_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tool_name: tool_name.into(),
            input,
            user_id,
            state: InvocationState::Requested,
            approved: false,
        }
    }

    pub fn state(&self) -> InvocationState {
        self.state
    }

    /// Whether the user approved this specific invocation.
    pub fn approval_recorded(&self) -> bool {
        self.approved
    }

    fn advance(&mut self, next: InvocationState) -> Result<(), ToolError> {
        if !self.state.can_transition_to(next) {
            return Err(ToolError::ExecutionFailed(format!(
                "invalid invocation transition {:?} -> {:?} for '{}'",
                self.state, next, self.tool_name
            )));
        }
        debug!(invocation = %self.id, from = ?self.state, to = ?next, "Invocation transition");
        if next == InvocationState::Approved {
            self.approved = true;
        }
        self.state = next;
        Ok(())
    }
}

/// Why a sensitive call did not go ahead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialReason {
    /// The user answered no.
    Declined,
    /// The answer was not a recognised yes/no token, even after re-prompting.
    Ambiguous { answer: String },
    /// No answer arrived in time.
    TimedOut(Duration),
    /// The prompt could not be shown or read.
    PromptUnavailable(String),
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::Declined => write!(f, "declined"),
            DenialReason::Ambiguous { answer } => {
                write!(f, "ambiguous confirmation '{}'", answer)
            }
            DenialReason::TimedOut(after) => write!(f, "no answer after {:?}", after),
            DenialReason::PromptUnavailable(err) => write!(f, "prompt unavailable: {}", err),
        }
    }
}

/// Raised in place of a tool result when the user does not approve a call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("user denied the call to '{tool_name}' ({reason})")]
pub struct UserDeniedToolCall {
    pub tool_name: String,
    pub reason: DenialReason,
}

/// Intercepts calls to sensitive tools and asks the user first.
pub struct ConfirmationGate {
    policy: Arc<SensitivityPolicy>,
    prompter: Arc<dyn ConfirmationPrompter>,
    timeout: Option<Duration>,
    ambiguous_retries: u32,
}

impl ConfirmationGate {
    pub fn new(policy: Arc<SensitivityPolicy>, prompter: Arc<dyn ConfirmationPrompter>) -> Self {
        Self {
            policy,
            prompter,
            timeout: Some(DEFAULT_CONFIRM_TIMEOUT),
            ambiguous_retries: 1,
        }
    }

    /// Per-prompt answer deadline. `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// How many times an unrecognised answer is re-asked before denying.
    pub fn with_ambiguous_retries(mut self, retries: u32) -> Self {
        self.ambiguous_retries = retries;
        self
    }

    pub fn policy(&self) -> &SensitivityPolicy {
        &self.policy
    }

    /// Run `underlying_call` for `invocation`, asking the user first when the
    /// tool is sensitive. Non-sensitive calls pass straight through.
    pub async fn guard<F, Fut>(
        &self,
        invocation: &mut PendingInvocation,
        underlying_call: F,
    ) -> Result<ToolResult, ToolError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<ToolResult, ToolError>> + Send,
    {
        if !self.policy.is_sensitive(&invocation.tool_name) {
            invocation.advance(InvocationState::Executed)?;
            return underlying_call().await;
        }

        invocation.advance(InvocationState::AwaitingApproval)?;
        info!(
            tool = %invocation.tool_name,
            invocation = %invocation.id,
            "Tool call requires confirmation"
        );

        match self.request_approval(invocation).await {
            Ok(()) => {
                invocation.advance(InvocationState::Approved)?;
                info!(tool = %invocation.tool_name, invocation = %invocation.id, "Tool call approved");
                let result = underlying_call().await;
                invocation.advance(InvocationState::Executed)?;
                result
            }
            Err(reason) => {
                invocation.advance(InvocationState::Denied)?;
                invocation.advance(InvocationState::Cancelled)?;
                warn!(
                    tool = %invocation.tool_name,
                    invocation = %invocation.id,
                    reason = %reason,
                    "Tool call denied"
                );
                Err(ToolError::UserDenied(UserDeniedToolCall {
                    tool_name: invocation.tool_name.clone(),
                    reason,
                }))
            }
        }
    }

    async fn request_approval(&self, invocation: &PendingInvocation) -> Result<(), DenialReason> {
        let mut last_answer = String::new();
        for attempt in 0..=self.ambiguous_retries {
            let asked = self.prompter.ask(invocation, attempt);
            let answer = match self.timeout {
                Some(limit) => match tokio::time::timeout(limit, asked).await {
                    Ok(answer) => answer,
                    Err(_) => return Err(DenialReason::TimedOut(limit)),
                },
                None => asked.await,
            };
            let answer = answer.map_err(|e| DenialReason::PromptUnavailable(e.to_string()))?;

            match parse_confirmation(&answer) {
                Some(true) => return Ok(()),
                Some(false) => return Err(DenialReason::Declined),
                None => {
                    debug!(attempt, answer = %answer.trim(), "Unrecognised confirmation answer");
                    last_answer = answer.trim().to_string();
                }
            }
        }
        Err(DenialReason::Ambiguous {
            answer: last_answer,
        })
    }

    /// Compose the gate around `tool`. Sensitive tools come back wrapped in a
    /// [`GuardedTool`]; anything else is returned as-is.
    pub fn wrap(self: &Arc<Self>, tool: Arc<dyn Tool>) -> Arc<dyn Tool> {
        let name = tool.definition().name;
        if self.policy.is_sensitive(&name) {
            debug!(tool = %name, "Wrapping tool with confirmation gate");
            Arc::new(GuardedTool {
                inner: tool,
                gate: Arc::clone(self),
            })
        } else {
            tool
        }
    }
}

/// A tool whose every call goes through a [`ConfirmationGate`].
///
/// Presents the same definition as the wrapped tool.
pub struct GuardedTool {
    inner: Arc<dyn Tool>,
    gate: Arc<ConfirmationGate>,
}

#[async_trait]
impl Tool for GuardedTool {
    fn definition(&self) -> ToolDefinition {
        self.inner.definition()
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolResult, ToolError> {
        let mut invocation = PendingInvocation::new(
            self.inner.definition().name,
            input.clone(),
            context.user_id.clone(),
        );
        let inner = Arc::clone(&self.inner);
        self.gate
            .guard(&mut invocation, || async move { inner.execute(input, context).await })
            .await
    }
}

/// Prompters with canned answers for tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Answers prompts from a queue and records what was asked.
    /// An exhausted queue behaves like a closed console.
    pub struct ScriptedPrompter {
        answers: Mutex<VecDeque<String>>,
        asked: Mutex<Vec<String>>,
    }

    impl ScriptedPrompter {
        pub fn new<I, S>(answers: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
                asked: Mutex::new(Vec::new()),
            }
        }

        /// Tool names of every prompt issued, in order.
        pub fn asked(&self) -> Vec<String> {
            self.asked.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ConfirmationPrompter for ScriptedPrompter {
        async fn ask(&self, invocation: &PendingInvocation, _attempt: u32) -> std::io::Result<String> {
            self.asked.lock().unwrap().push(invocation.tool_name.clone());
            self.answers.lock().unwrap().pop_front().ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "no scripted answer left")
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::ScriptedPrompter;
    use super::*;
    use crate::tool::mock::RecordingTool;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn gate_with(sensitive: &[&str], answers: &[&str]) -> (ConfirmationGate, Arc<ScriptedPrompter>) {
        let prompter = Arc::new(ScriptedPrompter::new(answers.iter().copied()));
        let gate = ConfirmationGate::new(
            Arc::new(SensitivityPolicy::from_names(sensitive.iter().copied())),
            prompter.clone() as Arc<dyn ConfirmationPrompter>,
        );
        (gate, prompter)
    }

    fn ok_result(content: &str) -> Result<ToolResult, ToolError> {
        Ok(ToolResult {
            tool_call_id: String::new(),
            content: content.to_string(),
            is_error: false,
        })
    }

    #[test]
    fn test_state_machine_transitions() {
        use InvocationState::*;
        assert!(Requested.can_transition_to(Executed));
        assert!(Requested.can_transition_to(AwaitingApproval));
        assert!(!Requested.can_transition_to(Approved));
        assert!(!Requested.can_transition_to(Denied));
        assert!(AwaitingApproval.can_transition_to(Denied));
        assert!(!Denied.can_transition_to(Executed));
        assert!(!Executed.can_transition_to(Cancelled));
        assert!(Executed.is_terminal());
        assert!(Cancelled.is_terminal());
        assert!(!Approved.is_terminal());
    }

    #[tokio::test]
    async fn test_non_sensitive_passes_through() {
        let (gate, prompter) = gate_with(&[], &[]);
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let mut invocation = PendingInvocation::new("ListEmails", json!({}), None);

        let result = gate
            .guard(&mut invocation, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                ok_result("3 emails")
            })
            .await
            .unwrap();

        assert_eq!(result.content, "3 emails");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(prompter.asked().is_empty());
        assert_eq!(invocation.state(), InvocationState::Executed);
        assert!(!invocation.approval_recorded());
    }

    #[tokio::test]
    async fn test_non_sensitive_error_is_unchanged() {
        let (gate, _prompter) = gate_with(&["SendEmail"], &[]);
        let mut invocation = PendingInvocation::new("ListEmails", json!({}), None);

        let err = gate
            .guard(&mut invocation, || async {
                Err(ToolError::InvalidInput("bad folder".to_string()))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::InvalidInput(ref m) if m == "bad folder"));
    }

    #[tokio::test]
    async fn test_sensitive_approved() {
        let (gate, prompter) = gate_with(&["SendEmail"], &["yes"]);
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let mut invocation =
            PendingInvocation::new("SendEmail", json!({"to": "bob@example.com"}), None);

        let result = gate
            .guard(&mut invocation, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                ok_result("sent")
            })
            .await
            .unwrap();

        assert_eq!(result.content, "sent");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(prompter.asked(), vec!["SendEmail".to_string()]);
        assert!(invocation.approval_recorded());
        assert_eq!(invocation.state(), InvocationState::Executed);
    }

    #[tokio::test]
    async fn test_sensitive_declined_never_calls() {
        let (gate, _prompter) = gate_with(&["SendEmail"], &["no"]);
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let mut invocation = PendingInvocation::new("SendEmail", json!({}), None);

        let err = gate
            .guard(&mut invocation, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                ok_result("sent")
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(invocation.state(), InvocationState::Cancelled);
        assert!(!invocation.approval_recorded());
        match err {
            ToolError::UserDenied(denied) => {
                assert_eq!(denied.tool_name, "SendEmail");
                assert_eq!(denied.reason, DenialReason::Declined);
            }
            other => panic!("expected denial, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ambiguous_reprompts_once_then_denies() {
        let (gate, prompter) = gate_with(&["SendEmail"], &["maybe", "perhaps", "yes"]);
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let mut invocation = PendingInvocation::new("SendEmail", json!({}), None);

        let err = gate
            .guard(&mut invocation, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                ok_result("sent")
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(prompter.asked().len(), 2);
        assert!(matches!(
            err,
            ToolError::UserDenied(UserDeniedToolCall {
                reason: DenialReason::Ambiguous { ref answer },
                ..
            }) if answer == "perhaps"
        ));
    }

    #[tokio::test]
    async fn test_ambiguous_without_retries() {
        let (gate, prompter) = gate_with(&["SendEmail"], &["maybe", "yes"]);
        let gate = gate.with_ambiguous_retries(0);
        let mut invocation = PendingInvocation::new("SendEmail", json!({}), None);

        let err = gate
            .guard(&mut invocation, || async { ok_result("sent") })
            .await
            .unwrap_err();

        assert_eq!(prompter.asked().len(), 1);
        assert!(matches!(err, ToolError::UserDenied(_)));
    }

    #[tokio::test]
    async fn test_closed_prompt_denies() {
        let (gate, _prompter) = gate_with(&["SendEmail"], &[]);
        let mut invocation = PendingInvocation::new("SendEmail", json!({}), None);

        let err = gate
            .guard(&mut invocation, || async { ok_result("sent") })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ToolError::UserDenied(UserDeniedToolCall {
                reason: DenialReason::PromptUnavailable(_),
                ..
            })
        ));
    }

    struct SilentPrompter;

    #[async_trait]
    impl ConfirmationPrompter for SilentPrompter {
        async fn ask(&self, _invocation: &PendingInvocation, _attempt: u32) -> std::io::Result<String> {
            std::future::pending::<()>().await;
            Ok(String::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_denies() {
        let gate = ConfirmationGate::new(
            Arc::new(SensitivityPolicy::from_names(["SendEmail"])),
            Arc::new(SilentPrompter),
        )
        .with_timeout(Some(Duration::from_secs(5)));
        let mut invocation = PendingInvocation::new("SendEmail", json!({}), None);

        let err = gate
            .guard(&mut invocation, || async { ok_result("sent") })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ToolError::UserDenied(UserDeniedToolCall {
                reason: DenialReason::TimedOut(d),
                ..
            }) if d == Duration::from_secs(5)
        ));
        assert_eq!(invocation.state(), InvocationState::Cancelled);
    }

    #[tokio::test]
    async fn test_wrap_only_sensitive_tools() {
        let (gate, prompter) = gate_with(&["SendEmail"], &["n"]);
        let gate = Arc::new(gate);

        let list = Arc::new(RecordingTool::new("ListEmails"));
        let send = Arc::new(RecordingTool::new("SendEmail"));

        let list_wrapped = gate.wrap(list.clone() as Arc<dyn Tool>);
        let send_wrapped = gate.wrap(send.clone() as Arc<dyn Tool>);

        // Non-sensitive tools are handed back untouched.
        let list_dyn: Arc<dyn Tool> = list.clone();
        assert!(Arc::ptr_eq(&list_wrapped, &list_dyn));
        assert_eq!(send_wrapped.definition().name, "SendEmail");

        let ctx = ToolContext::for_user(Some("u1".to_string()));
        list_wrapped.execute(json!({"message": "hi"}), &ctx).await.unwrap();
        let err = send_wrapped
            .execute(json!({"message": "hi"}), &ctx)
            .await
            .unwrap_err();

        assert_eq!(list.calls(), 1);
        assert_eq!(send.calls(), 0);
        assert_eq!(prompter.asked(), vec!["SendEmail".to_string()]);
        assert!(matches!(err, ToolError::UserDenied(_)));
    }

    #[test]
    fn test_denial_message_names_tool() {
        let denied = UserDeniedToolCall {
            tool_name: "SendEmail".to_string(),
            reason: DenialReason::Declined,
        };
        assert_eq!(
            denied.to_string(),
            "user denied the call to 'SendEmail' (declined)"
        );
    }
}
