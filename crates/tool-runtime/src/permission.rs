//! Which tools need a human decision, and how that decision is asked for.

use async_trait::async_trait;
use std::collections::HashSet;

use crate::gate::PendingInvocation;

/// Static classification of tools that require user confirmation.
///
/// Entries are exact tool names or prefix patterns ending in `*`
/// (e.g. `"OutlookMail_Send*"`). Built once at startup and never mutated.
#[derive(Debug, Clone, Default)]
pub struct SensitivityPolicy {
    exact: HashSet<String>,
    prefixes: Vec<String>,
}

impl SensitivityPolicy {
    /// A policy under which nothing is sensitive.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut policy = Self::default();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            match name.strip_suffix('*') {
                Some(prefix) => policy.prefixes.push(prefix.to_string()),
                None => {
                    policy.exact.insert(name.to_string());
                }
            }
        }
        policy
    }

    /// Checks exact names first, then prefix patterns.
    pub fn is_sensitive(&self, tool_name: &str) -> bool {
        if self.exact.contains(tool_name) {
            return true;
        }
        self.prefixes
            .iter()
            .any(|prefix| tool_name.starts_with(prefix.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.prefixes.is_empty()
    }
}

/// Interactive surface that asks the user to approve a tool call.
///
/// The CLI reads a line from the console; other front ends can answer
/// from a UI process. Implementations return the raw answer and leave the
/// interpretation to the gate.
#[async_trait]
pub trait ConfirmationPrompter: Send + Sync {
    /// Ask about `invocation`. `attempt` starts at 0 and increases when the
    /// previous answer was not understood.
    async fn ask(&self, invocation: &PendingInvocation, attempt: u32) -> std::io::Result<String>;
}

/// Interpret a yes/no answer. Returns `None` for anything unrecognised,
/// including an empty line.
pub fn parse_confirmation(answer: &str) -> Option<bool> {
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_policy() {
        let policy = SensitivityPolicy::empty();
        assert!(policy.is_empty());
        assert!(!policy.is_sensitive("OutlookMail_SendEmail"));
    }

    #[test]
    fn test_exact_names() {
        let policy = SensitivityPolicy::from_names(["SendEmail", "  "]);
        assert!(policy.is_sensitive("SendEmail"));
        assert!(!policy.is_sensitive("ListEmails"));
        assert!(!policy.is_sensitive("SendEmailDraft"));
    }

    #[test]
    fn test_prefix_pattern() {
        let policy = SensitivityPolicy::from_names(["OutlookMail_Send*"]);
        assert!(policy.is_sensitive("OutlookMail_SendDraftEmail"));
        assert!(policy.is_sensitive("OutlookMail_SendEmail"));
        assert!(!policy.is_sensitive("OutlookMail_ListEmails"));
    }

    #[test]
    fn test_parse_confirmation() {
        assert_eq!(parse_confirmation("y"), Some(true));
        assert_eq!(parse_confirmation(" YES \n"), Some(true));
        assert_eq!(parse_confirmation("No"), Some(false));
        assert_eq!(parse_confirmation("n"), Some(false));
        assert_eq!(parse_confirmation("maybe"), None);
        assert_eq!(parse_confirmation(""), None);
    }
}
