//! Error types for the toolkit crate.

/// Errors that can occur while talking to the toolkit service.
#[derive(Debug, thiserror::Error)]
pub enum ToolkitError {
    /// The request could not be sent or the response body not read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service rejected the API key.
    #[error("Unauthorized: check the toolkit API key")]
    Unauthorized,

    /// The service answered with a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The response body did not match the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ToolkitError {
    /// Whether the failure concerns the request itself rather than the
    /// service as a whole (bad tool name, refused user, ...).
    pub fn is_client_error(&self) -> bool {
        matches!(self, ToolkitError::Api { status, .. } if (400..500).contains(status))
    }
}
