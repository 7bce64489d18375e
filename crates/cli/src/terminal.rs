use anyhow::Result;
use async_trait::async_trait;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use mailgate_tool_runtime::authorization::{ConsentPresenter, ConsentRequest};
use mailgate_tool_runtime::gate::PendingInvocation;
use mailgate_tool_runtime::permission::ConfirmationPrompter;
use mailgate_tool_runtime::stream::StreamEvent;

/// Color scheme for terminal output.
struct Colors;

impl Colors {
    const USER_PROMPT: Color = Color::Green;
    const ASSISTANT_TEXT: Color = Color::Cyan;
    const TOOL_CALL: Color = Color::Yellow;
    const TOOL_RESULT: Color = Color::DarkGreen;
    const ERROR: Color = Color::Red;
    const DIM: Color = Color::DarkGrey;
    const HEADER: Color = Color::Magenta;
}

/// Whether a chat line ends the session.
pub fn is_exit(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("exit")
}

/// Manages terminal I/O for the interactive REPL.
///
/// Stdin is read on a dedicated thread and handed over line by line, so
/// the chat prompt and the confirmation prompt share one source and a
/// confirmation that timed out does not swallow the next chat line.
pub struct Terminal {
    lines: Mutex<mpsc::UnboundedReceiver<String>>,
    /// Set while a confirmation question waits for its answer. Still set on
    /// the next chat prompt means the question was abandoned by a timeout.
    awaiting_answer: AtomicBool,
}

impl Terminal {
    /// Create a terminal reading from stdin.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "stdin read failed");
                        break;
                    }
                }
            }
        });
        Self::from_receiver(rx)
    }

    /// Create a terminal fed from an arbitrary line source.
    pub fn from_receiver(lines: mpsc::UnboundedReceiver<String>) -> Self {
        Self {
            lines: Mutex::new(lines),
            awaiting_answer: AtomicBool::new(false),
        }
    }

    /// Next input line, or `None` once input is closed.
    async fn next_line(&self) -> Option<String> {
        self.lines.lock().await.recv().await
    }

    /// Drop lines already queued, returning how many were dropped.
    async fn discard_pending_lines(&self) -> usize {
        let mut lines = self.lines.lock().await;
        let mut count = 0;
        while lines.try_recv().is_ok() {
            count += 1;
        }
        count
    }

    /// Print the startup banner.
    pub fn print_banner(&self, model: &str, user_id: Option<&str>, tools: &[String]) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::HEADER),
            Print("mailgate"),
            ResetColor,
            Print(" - Email Agent\n"),
            SetForegroundColor(Colors::DIM),
            Print(format!(
                "Model: {} | User: {} | Tools: {}\n",
                model,
                user_id.unwrap_or("(none)"),
                tools.len()
            )),
            Print("Type 'exit' to end.\n"),
            Print("---\n"),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Read a line of user input with prompt.
    /// Returns None if the user wants to exit or input is closed.
    pub async fn read_input(&self) -> Result<Option<String>> {
        let mut stdout = io::stdout();
        if self.awaiting_answer.swap(false, Ordering::SeqCst) {
            let stale = self.discard_pending_lines().await;
            debug!(stale, "Discarded answers to an expired confirmation");
            execute!(
                stdout,
                SetForegroundColor(Colors::DIM),
                Print("\nThe confirmation timed out and the call was cancelled.\n"),
                ResetColor,
            )?;
        }
        execute!(
            stdout,
            Print("\n"),
            SetForegroundColor(Colors::USER_PROMPT),
            Print("You: "),
            ResetColor,
        )?;
        stdout.flush()?;

        let Some(line) = self.next_line().await else {
            return Ok(None);
        };
        if is_exit(&line) {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Display a stream event in the terminal with appropriate formatting.
    pub fn display_event(&self, event: &StreamEvent) -> Result<()> {
        let mut stdout = io::stdout();
        match event {
            StreamEvent::TextDelta { text } => {
                execute!(
                    stdout,
                    SetForegroundColor(Colors::ASSISTANT_TEXT),
                    Print(text),
                    ResetColor,
                )?;
            }
            StreamEvent::ToolCallStart { id: _, name } => {
                execute!(
                    stdout,
                    Print("\n"),
                    SetForegroundColor(Colors::TOOL_CALL),
                    Print(format!("[tool: {}] ", name)),
                    ResetColor,
                )?;
            }
            StreamEvent::ToolCallDelta { arguments_delta, .. } => {
                debug!(delta = %arguments_delta, "Tool call argument delta");
            }
            StreamEvent::ToolCallEnd { id } => {
                execute!(
                    stdout,
                    SetForegroundColor(Colors::DIM),
                    Print(format!("[call {}]\n", short_id(id))),
                    ResetColor,
                )?;
            }
            StreamEvent::ToolResult {
                name,
                content,
                is_error,
                ..
            } => {
                self.display_tool_result(name, content, *is_error)?;
            }
            StreamEvent::ToolCallDenied { name, .. } => {
                execute!(
                    stdout,
                    SetForegroundColor(Colors::ERROR),
                    Print(format!("  [{} denied]\n", name)),
                    ResetColor,
                )?;
            }
            StreamEvent::MessageEnd { stop_reason } => {
                debug!(?stop_reason, "Message ended");
                execute!(stdout, Print("\n"))?;
            }
            StreamEvent::Error { message } => {
                execute!(
                    stdout,
                    Print("\n"),
                    SetForegroundColor(Colors::ERROR),
                    Print(format!("[error: {}]\n", message)),
                    ResetColor,
                )?;
            }
        }
        stdout.flush()?;
        Ok(())
    }

    /// Display a tool execution result.
    pub fn display_tool_result(&self, tool_name: &str, content: &str, is_error: bool) -> Result<()> {
        let mut stdout = io::stdout();
        let color = if is_error {
            Colors::ERROR
        } else {
            Colors::TOOL_RESULT
        };
        let label = if is_error { "error" } else { "result" };

        execute!(
            stdout,
            SetForegroundColor(color),
            Print(format!("  [{} {}]: {}\n", tool_name, label, truncate(content, 500))),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Print a complete assistant message.
    pub fn print_assistant(&self, text: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::ASSISTANT_TEXT),
            Print(format!("{}\n", text)),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Print an error message.
    pub fn print_error(&self, msg: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::ERROR),
            Print(format!("Error: {}\n", msg)),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Print an info message.
    pub fn print_info(&self, msg: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::DIM),
            Print(format!("{}\n", msg)),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    fn print_confirmation(&self, invocation: &PendingInvocation, attempt: u32) -> io::Result<()> {
        let mut stdout = io::stdout();
        if attempt == 0 {
            let args = serde_json::to_string_pretty(&invocation.input)
                .unwrap_or_else(|_| invocation.input.to_string());
            execute!(
                stdout,
                Print("\n"),
                SetForegroundColor(Colors::TOOL_CALL),
                Print(format!(
                    "The agent wants to call '{}' with:\n{}\n",
                    invocation.tool_name, args
                )),
                ResetColor,
            )?;
        } else {
            execute!(
                stdout,
                SetForegroundColor(Colors::DIM),
                Print("Please answer 'y' or 'n'.\n"),
                ResetColor,
            )?;
        }
        execute!(
            stdout,
            SetForegroundColor(Colors::USER_PROMPT),
            Print("Do you approve this tool call? [y/n] "),
            ResetColor,
        )?;
        stdout.flush()
    }
}

impl Default for Terminal {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfirmationPrompter for Terminal {
    async fn ask(&self, invocation: &PendingInvocation, attempt: u32) -> io::Result<String> {
        self.print_confirmation(invocation, attempt)?;
        self.awaiting_answer.store(true, Ordering::SeqCst);
        let line = self.next_line().await;
        self.awaiting_answer.store(false, Ordering::SeqCst);
        line.ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "input closed"))
    }
}

#[async_trait]
impl ConsentPresenter for Terminal {
    async fn present(&self, request: &ConsentRequest) {
        let mut stdout = io::stdout();
        let url = request.url.as_deref().unwrap_or("(no link provided)");
        execute!(
            stdout,
            SetForegroundColor(Colors::TOOL_CALL),
            Print(format!("Authorization required for '{}'.\n", request.tool_name)),
            ResetColor,
            Print(format!("Open this link to grant access:\n  {}\n", url)),
            SetForegroundColor(Colors::DIM),
            Print("Waiting for authorization to complete...\n"),
            ResetColor,
        )
        .ok();
        stdout.flush().ok();
    }
}

fn short_id(id: &str) -> &str {
    match id.char_indices().nth(12) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

/// Truncate long output for display, on a char boundary.
fn truncate(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((idx, _)) => format!(
            "{}... ({} chars total)",
            &content[..idx],
            content.chars().count()
        ),
        None => content.to_string(),
    }
}
