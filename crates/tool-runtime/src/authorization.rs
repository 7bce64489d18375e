//! One-time authorization handshake per (tool, user) pair.
//!
//! Before a tool is offered to the agent it must be authorized against the
//! external authorization service. The service may answer that the user has
//! to grant consent out-of-band (typically by opening a URL); in that case
//! the requirement is shown to the user through a [`ConsentPresenter`] and
//! the client blocks until the service reports completion.
//!
//! Grants are remembered for the session so repeated calls are no-ops.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::registry::{RegistryError, ToolRegistry};
use crate::tool::Tool;

/// Status reported by the authorization service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationStatus {
    /// The user may call the tool.
    Completed,
    /// The user must act out-of-band before the tool can be used.
    Pending {
        id: String,
        url: Option<String>,
    },
    /// The service refused.
    Failed { reason: String },
}

/// The external authorization service.
#[async_trait]
pub trait AuthorizationService: Send + Sync {
    /// Start (or look up) authorization of `tool_name` for `user_id`.
    async fn request_authorization(
        &self,
        tool_name: &str,
        user_id: &str,
    ) -> Result<AuthorizationStatus, AuthorizationError>;

    /// Block until the pending authorization `authorization_id` changes
    /// state or the service's own wait window elapses. Returning
    /// `Pending` again means "keep waiting".
    async fn wait_for_completion(
        &self,
        authorization_id: &str,
    ) -> Result<AuthorizationStatus, AuthorizationError>;
}

/// What the user needs to do to finish an out-of-band authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentRequest {
    pub tool_name: String,
    pub user_id: String,
    pub url: Option<String>,
}

/// Shows a consent requirement to the user.
#[async_trait]
pub trait ConsentPresenter: Send + Sync {
    async fn present(&self, request: &ConsentRequest);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationOutcome {
    /// The service granted access during this call.
    Granted,
    /// Access was granted earlier in this session; the service was not contacted.
    AlreadyGranted,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthorizationError {
    #[error("Tool name must not be empty")]
    EmptyToolName,
    #[error("Authorization failed for tool '{tool_name}': {reason}")]
    Failed { tool_name: String, reason: String },
    #[error("Authorization service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AuthorizationError {
    /// Fatal errors end the session; per-tool failures only exclude that tool.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AuthorizationError::ServiceUnavailable(_))
    }
}

/// Performs the handshake and remembers which pairs are already granted.
pub struct AuthorizationClient {
    service: Arc<dyn AuthorizationService>,
    presenter: Arc<dyn ConsentPresenter>,
    consent_timeout: Option<Duration>,
    granted: Mutex<HashSet<(String, String)>>,
}

impl AuthorizationClient {
    pub fn new(service: Arc<dyn AuthorizationService>, presenter: Arc<dyn ConsentPresenter>) -> Self {
        Self {
            service,
            presenter,
            consent_timeout: None,
            granted: Mutex::new(HashSet::new()),
        }
    }

    /// Give up on out-of-band consent after `timeout`. Waits indefinitely by default.
    pub fn with_consent_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.consent_timeout = timeout;
        self
    }

    pub fn is_granted(&self, tool_name: &str, user_id: Option<&str>) -> bool {
        let key = (tool_name.to_string(), user_id.unwrap_or_default().to_string());
        self.granted
            .lock()
            .map(|granted| granted.contains(&key))
            .unwrap_or(false)
    }

    /// Authorize `tool_name` for `user_id`. A missing or empty user id is
    /// passed through to the service as the empty identity.
    pub async fn authorize(
        &self,
        tool_name: &str,
        user_id: Option<&str>,
    ) -> Result<AuthorizationOutcome, AuthorizationError> {
        if tool_name.trim().is_empty() {
            return Err(AuthorizationError::EmptyToolName);
        }
        let user = user_id.unwrap_or_default();

        if self.is_granted(tool_name, Some(user)) {
            debug!(tool = %tool_name, user = %user, "Authorization already granted");
            return Ok(AuthorizationOutcome::AlreadyGranted);
        }

        let status = self.service.request_authorization(tool_name, user).await?;
        let status = match status {
            AuthorizationStatus::Pending { id, url } => {
                info!(tool = %tool_name, user = %user, "Authorization requires user consent");
                self.presenter
                    .present(&ConsentRequest {
                        tool_name: tool_name.to_string(),
                        user_id: user.to_string(),
                        url,
                    })
                    .await;
                self.await_consent(tool_name, &id).await?
            }
            other => other,
        };

        match status {
            AuthorizationStatus::Completed => {
                if let Ok(mut granted) = self.granted.lock() {
                    granted.insert((tool_name.to_string(), user.to_string()));
                }
                info!(tool = %tool_name, user = %user, "Authorization granted");
                Ok(AuthorizationOutcome::Granted)
            }
            AuthorizationStatus::Failed { reason } => Err(AuthorizationError::Failed {
                tool_name: tool_name.to_string(),
                reason,
            }),
            AuthorizationStatus::Pending { .. } => Err(AuthorizationError::Failed {
                tool_name: tool_name.to_string(),
                reason: "authorization still pending".to_string(),
            }),
        }
    }

    async fn await_consent(
        &self,
        tool_name: &str,
        authorization_id: &str,
    ) -> Result<AuthorizationStatus, AuthorizationError> {
        let wait = async {
            loop {
                match self.service.wait_for_completion(authorization_id).await? {
                    AuthorizationStatus::Pending { .. } => {
                        debug!(tool = %tool_name, id = %authorization_id, "Still waiting for consent");
                    }
                    done => return Ok::<_, AuthorizationError>(done),
                }
            }
        };

        match self.consent_timeout {
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(status) => status,
                Err(_) => Ok(AuthorizationStatus::Failed {
                    reason: format!("no consent after {:?}", limit),
                }),
            },
            None => wait.await,
        }
    }
}

/// Which candidate tools made it into the registry.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RegistrationReport {
    pub registered: Vec<String>,
    pub excluded: Vec<(String, String)>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Authorize every candidate once and register the ones that pass.
///
/// A refused tool is left out of the registry and the session carries on;
/// losing the service altogether aborts registration.
pub async fn register_authorized(
    registry: &mut ToolRegistry,
    client: &AuthorizationClient,
    tools: Vec<Arc<dyn Tool>>,
    user_id: Option<&str>,
) -> Result<RegistrationReport, RegistrationError> {
    let mut report = RegistrationReport::default();

    for tool in tools {
        let name = tool.definition().name;
        match client.authorize(&name, user_id).await {
            Ok(_) => {
                registry.register_arc(tool)?;
                report.registered.push(name);
            }
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                warn!(tool = %name, error = %e, "Excluding tool after failed authorization");
                report.excluded.push((name, e.to_string()));
            }
        }
    }

    info!(
        registered = report.registered.len(),
        excluded = report.excluded.len(),
        "Tool registration complete"
    );
    Ok(report)
}

/// Scripted authorization service for tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use std::collections::{HashMap, VecDeque};

    /// Returns a fixed initial status per tool and replays queued statuses
    /// for `wait_for_completion`. Unlisted tools are granted immediately.
    #[derive(Default)]
    pub struct MockAuthorizationService {
        initial: Mutex<HashMap<String, AuthorizationStatus>>,
        waits: Mutex<VecDeque<AuthorizationStatus>>,
        requests: Mutex<Vec<(String, String)>>,
        unavailable: bool,
    }

    impl MockAuthorizationService {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every request fails as if the service were unreachable.
        pub fn unavailable() -> Self {
            Self {
                unavailable: true,
                ..Self::default()
            }
        }

        pub fn with_status(self, tool_name: &str, status: AuthorizationStatus) -> Self {
            self.initial
                .lock()
                .unwrap()
                .insert(tool_name.to_string(), status);
            self
        }

        pub fn with_wait_statuses(self, statuses: Vec<AuthorizationStatus>) -> Self {
            self.waits.lock().unwrap().extend(statuses);
            self
        }

        /// (tool, user) pairs passed to `request_authorization`.
        pub fn requests(&self) -> Vec<(String, String)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AuthorizationService for MockAuthorizationService {
        async fn request_authorization(
            &self,
            tool_name: &str,
            user_id: &str,
        ) -> Result<AuthorizationStatus, AuthorizationError> {
            if self.unavailable {
                return Err(AuthorizationError::ServiceUnavailable(
                    "connection refused".to_string(),
                ));
            }
            self.requests
                .lock()
                .unwrap()
                .push((tool_name.to_string(), user_id.to_string()));
            Ok(self
                .initial
                .lock()
                .unwrap()
                .get(tool_name)
                .cloned()
                .unwrap_or(AuthorizationStatus::Completed))
        }

        async fn wait_for_completion(
            &self,
            _authorization_id: &str,
        ) -> Result<AuthorizationStatus, AuthorizationError> {
            Ok(self
                .waits
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(AuthorizationStatus::Completed))
        }
    }

    /// Records consent requests instead of showing them.
    #[derive(Default)]
    pub struct RecordingPresenter {
        shown: Mutex<Vec<ConsentRequest>>,
    }

    impl RecordingPresenter {
        pub fn shown(&self) -> Vec<ConsentRequest> {
            self.shown.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ConsentPresenter for RecordingPresenter {
        async fn present(&self, request: &ConsentRequest) {
            self.shown.lock().unwrap().push(request.clone());
        }
    }
}
