use clap::Parser;

/// Email agent that asks before it sends.
///
/// Provides a terminal REPL in front of a tool-calling model. Mail tools
/// come from the remote toolkit service; sensitive ones need a yes/no from
/// the user on every call.
#[derive(Parser, Debug)]
#[command(name = "mailgate", about = "Email agent that asks before it sends")]
pub struct CliArgs {
    /// Identity the tools act on behalf of
    #[arg(long, env = "ARCADE_USER_ID")]
    pub user_id: Option<String>,

    /// Toolkit service API key (overrides config file)
    #[arg(long, env = "ARCADE_API_KEY", hide_env_values = true)]
    pub toolkit_api_key: Option<String>,

    /// Toolkit service base URL (overrides config file)
    #[arg(long, env = "ARCADE_BASE_URL")]
    pub toolkit_url: Option<String>,

    /// Model name (overrides config file)
    #[arg(long, env = "OPENAI_MODEL")]
    pub model: Option<String>,

    /// Model API key (overrides config file)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Path to config file (default: ~/.config/mailgate/config.toml)
    #[arg(long)]
    pub config: Option<String>,

    /// Toolkit to load; repeat for several. Replaces the configured list.
    #[arg(long = "toolkit")]
    pub toolkits: Vec<String>,

    /// Single tool to load in addition to the toolkits, e.g. `Search.Web`
    #[arg(long = "tool")]
    pub tools: Vec<String>,

    /// Tool that needs confirmation; repeat for several, `Prefix*` matches
    /// a family. Replaces the configured list.
    #[arg(long = "confirm")]
    pub confirm_tools: Vec<String>,

    /// Seconds to wait for a confirmation answer; 0 waits forever
    #[arg(long)]
    pub confirm_timeout: Option<u64>,

    /// System prompt override
    #[arg(long)]
    pub system_prompt: Option<String>,

    /// Maximum agentic loop iterations per turn
    #[arg(long, default_value = "10")]
    pub max_iterations: usize,
}
