use crate::tool::{ToolCall, ToolResult};
use serde::{Deserialize, Serialize};

/// A message in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ConversationMessage {
    /// User's text input
    User(String),
    /// Assistant's response (may contain text and/or tool calls)
    Assistant(AssistantContent),
    /// Result of a tool execution
    ToolResult(ToolResult),
}

impl ConversationMessage {
    /// A plain-text assistant turn with no tool calls.
    pub fn assistant_text(text: impl Into<String>) -> Self {
        ConversationMessage::Assistant(AssistantContent {
            text: Some(text.into()),
            tool_calls: vec![],
        })
    }

    /// Text carried by a user or assistant turn.
    pub fn text(&self) -> Option<&str> {
        match self {
            ConversationMessage::User(text) => Some(text),
            ConversationMessage::Assistant(content) => content.text.as_deref(),
            ConversationMessage::ToolResult(_) => None,
        }
    }
}

/// Content from the assistant that can contain mixed text and tool calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssistantContent {
    /// Text blocks in the response
    pub text: Option<String>,
    /// Tool calls requested by the assistant
    pub tool_calls: Vec<ToolCall>,
}

/// The three turns that close out a denied tool call: the assistant asks
/// for confirmation, the user declines, the assistant confirms the
/// cancellation. The last turn always names the tool.
pub fn denial_turns(tool_name: &str) -> [ConversationMessage; 3] {
    [
        ConversationMessage::assistant_text(format!("Please confirm the call to {}", tool_name)),
        ConversationMessage::User("I changed my mind, please don't do it!".to_string()),
        ConversationMessage::assistant_text(format!(
            "Sure, I cancelled the call to {}. What else can I do for you today?",
            tool_name
        )),
    ]
}

/// Fold a denial into `history`, returning the extended transcript.
/// The input is left untouched; the result is `history` followed by
/// [`denial_turns`].
pub fn on_denial(history: &[ConversationMessage], tool_name: &str) -> Vec<ConversationMessage> {
    let mut updated = Vec::with_capacity(history.len() + 3);
    updated.extend_from_slice(history);
    updated.extend(denial_turns(tool_name));
    updated
}

/// Position in a conversation that later turns can be rolled back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(usize);

/// Manages conversation history with context window awareness.
pub struct Conversation {
    messages: Vec<ConversationMessage>,
    /// Maximum approximate token count before truncation
    max_tokens: usize,
    /// System prompt (always retained)
    system_prompt: Option<String>,
    /// Messages dropped from the front by truncation so far
    dropped: usize,
}

impl Conversation {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_tokens,
            system_prompt: None,
            dropped: 0,
        }
    }

    pub fn with_system_prompt(mut self, prompt: String) -> Self {
        self.system_prompt = Some(prompt);
        self
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn add_user_message(&mut self, text: String) {
        self.messages.push(ConversationMessage::User(text));
        self.maybe_truncate();
    }

    pub fn add_assistant_response(&mut self, content: AssistantContent) {
        self.messages.push(ConversationMessage::Assistant(content));
        self.maybe_truncate();
    }

    pub fn add_tool_result(&mut self, result: ToolResult) {
        self.messages.push(ConversationMessage::ToolResult(result));
    }

    /// Append the synthetic turns for a denied call to `tool_name`.
    /// The three turns are appended together before any truncation.
    pub fn record_denial(&mut self, tool_name: &str) {
        self.messages.extend(denial_turns(tool_name));
        self.maybe_truncate();
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    /// Text of the most recent assistant turn, if any.
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages.iter().rev().find_map(|m| match m {
            ConversationMessage::Assistant(content) => content.text.as_deref(),
            _ => None,
        })
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.dropped + self.messages.len())
    }

    /// Drop every message added after `checkpoint`. Messages truncated away
    /// in the meantime are not restored.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        let keep = checkpoint.0.saturating_sub(self.dropped);
        self.messages.truncate(keep);
    }

    /// Approximate token count using character count / 4 heuristic.
    pub fn approximate_tokens(&self) -> usize {
        let char_count: usize = self
            .messages
            .iter()
            .map(|m| match m {
                ConversationMessage::User(text) => text.len(),
                ConversationMessage::Assistant(content) => {
                    content.text.as_ref().map_or(0, |t| t.len())
                        + content
                            .tool_calls
                            .iter()
                            .map(|tc| tc.input.to_string().len())
                            .sum::<usize>()
                }
                ConversationMessage::ToolResult(result) => result.content.len(),
            })
            .sum();
        char_count / 4
    }

    /// Drop oldest messages (keeping system prompt) when over token limit.
    /// The history never starts with a tool result whose call was dropped.
    fn maybe_truncate(&mut self) {
        let mut truncated = false;
        while self.approximate_tokens() > self.max_tokens && self.messages.len() > 2 {
            // Keep at least the last 2 messages (current turn)
            self.messages.remove(0);
            self.dropped += 1;
            truncated = true;
        }
        if !truncated {
            return;
        }
        while matches!(self.messages.first(), Some(ConversationMessage::ToolResult(_))) {
            self.messages.remove(0);
            self.dropped += 1;
        }
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(100_000) // 100k tokens default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_with_tool_calls() {
        let mut conv = Conversation::new(100_000);
        conv.add_user_message("List my emails".to_string());
        conv.add_assistant_response(AssistantContent {
            text: None,
            tool_calls: vec![ToolCall {
                id: "call_1".to_string(),
                name: "OutlookMail_ListEmails".to_string(),
                input: serde_json::json!({"limit": 2}),
            }],
        });
        conv.add_tool_result(ToolResult {
            tool_call_id: "call_1".to_string(),
            content: "[]".to_string(),
            is_error: false,
        });

        assert_eq!(conv.messages().len(), 3);
        assert!(conv.last_assistant_text().is_none());
    }

    #[test]
    fn test_on_denial_appends_three_turns() {
        let history = vec![ConversationMessage::User("send email to bob".to_string())];
        let updated = on_denial(&history, "SendEmail");

        assert_eq!(history.len(), 1);
        assert_eq!(updated.len(), 4);
        assert_eq!(updated[0], history[0]);
        assert!(matches!(updated[1], ConversationMessage::Assistant(_)));
        assert!(matches!(updated[2], ConversationMessage::User(_)));

        let last = updated[3].text().unwrap();
        assert!(last.contains("SendEmail"));
        assert!(last.contains("cancelled"));
    }

    #[test]
    fn test_on_denial_is_deterministic() {
        let a = on_denial(&[], "OutlookMail_SendDraftEmail");
        let b = on_denial(&[], "OutlookMail_SendDraftEmail");
        assert_eq!(a, b);
        assert_eq!(
            a[2].text(),
            Some("Sure, I cancelled the call to OutlookMail_SendDraftEmail. What else can I do for you today?")
        );
    }

    #[test]
    fn test_record_denial_matches_pure_adapter() {
        let mut conv = Conversation::new(100_000);
        conv.add_user_message("send email to bob".to_string());
        let expected = on_denial(conv.messages(), "SendEmail");

        conv.record_denial("SendEmail");
        assert_eq!(conv.messages(), expected.as_slice());
        assert_eq!(
            conv.last_assistant_text(),
            Some("Sure, I cancelled the call to SendEmail. What else can I do for you today?")
        );
    }

    #[test]
    fn test_rollback_discards_turn() {
        let mut conv = Conversation::new(100_000);
        conv.add_user_message("first".to_string());
        let mark = conv.checkpoint();
        conv.add_assistant_response(AssistantContent {
            text: None,
            tool_calls: vec![ToolCall {
                id: "call_1".to_string(),
                name: "SendEmail".to_string(),
                input: serde_json::json!({}),
            }],
        });
        conv.add_tool_result(ToolResult {
            tool_call_id: "call_1".to_string(),
            content: "partial".to_string(),
            is_error: false,
        });

        conv.rollback(mark);
        assert_eq!(conv.messages().len(), 1);
        assert_eq!(conv.messages()[0].text(), Some("first"));
    }

    #[test]
    fn test_rollback_after_truncation() {
        let mut conv = Conversation::new(10);
        for i in 0..5 {
            conv.add_user_message(format!("This is a longer message number {} with padding text", i));
        }
        let mark = conv.checkpoint();
        conv.add_assistant_response(AssistantContent {
            text: Some("This reply is long enough to push older turns out".to_string()),
            tool_calls: vec![],
        });
        let before = conv.messages().len();
        conv.rollback(mark);
        assert_eq!(conv.messages().len(), before - 1);
        assert!(matches!(
            conv.messages().last(),
            Some(ConversationMessage::User(_))
        ));
    }

    #[test]
    fn test_conversation_truncation() {
        let mut conv = Conversation::new(10); // Very small limit (~40 chars)
        for i in 0..100 {
            conv.add_user_message(format!("This is a longer message number {} with padding text", i));
        }
        // Should have truncated significantly (keeps minimum 2)
        assert!(conv.messages().len() <= 4);
    }

    #[test]
    fn test_truncation_drops_orphaned_tool_results() {
        let mut conv = Conversation::new(20);
        conv.add_user_message("Please list the two most recent emails in my inbox today".to_string());
        conv.add_assistant_response(AssistantContent {
            text: None,
            tool_calls: vec![ToolCall {
                id: "c1".to_string(),
                name: "OutlookMail_ListEmails".to_string(),
                input: serde_json::json!({"limit": 2}),
            }],
        });
        conv.add_tool_result(ToolResult {
            tool_call_id: "c1".to_string(),
            content: "[{\"subject\": \"Lunch\"}, {\"subject\": \"Quarterly report\"}]".to_string(),
            is_error: false,
        });
        let mark = conv.checkpoint();
        conv.add_assistant_response(AssistantContent {
            text: Some("You have two emails: Lunch and Quarterly report.".to_string()),
            tool_calls: vec![],
        });

        assert!(!matches!(
            conv.messages().first(),
            Some(ConversationMessage::ToolResult(_))
        ));
        assert_eq!(conv.messages().len(), 1);
        assert_eq!(
            conv.last_assistant_text(),
            Some("You have two emails: Lunch and Quarterly report.")
        );

        // Checkpoints stay aligned with the dropped prefix.
        conv.rollback(mark);
        assert!(conv.messages().is_empty());
    }

    #[test]
    fn test_serialization() {
        let mut conv = Conversation::new(100_000);
        conv.record_denial("SendEmail");
        let json = serde_json::to_string(conv.messages()).unwrap();
        let roundtrip: Vec<ConversationMessage> = serde_json::from_str(&json).unwrap();
        assert_eq!(roundtrip.as_slice(), conv.messages());
    }
}
