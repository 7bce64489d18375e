use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use mailgate_llm::providers::openai_tool_provider::{DEFAULT_BASE_URL as OPENAI_BASE_URL, DEFAULT_MODEL};
use mailgate_tool_runtime::DEFAULT_CONFIRM_TIMEOUT;
use mailgate_toolkit::DEFAULT_BASE_URL as TOOLKIT_BASE_URL;

/// CLI configuration loaded from TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Toolkits whose tools are offered to the model
    #[serde(default = "default_toolkits")]
    pub toolkits: Vec<String>,

    /// Individual tools loaded on top of the toolkits (`Toolkit.Tool`)
    #[serde(default)]
    pub tools: Vec<String>,

    /// Maximum number of tools listed per toolkit
    #[serde(default = "default_tool_limit")]
    pub tool_limit: usize,

    /// Tools that need a yes/no from the user on every call
    #[serde(default = "default_confirm_tools")]
    pub confirm_tools: Vec<String>,

    /// Seconds to wait for a confirmation answer; 0 waits forever
    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout_secs: u64,

    /// Give up on out-of-band consent after this many seconds
    #[serde(default)]
    pub consent_timeout_secs: Option<u64>,

    /// Toolkit service base URL
    #[serde(default = "default_toolkit_url")]
    pub toolkit_base_url: String,

    /// Toolkit service API key
    #[serde(default)]
    pub toolkit_api_key: Option<String>,

    /// OpenAI-compatible base URL
    #[serde(default = "default_openai_url")]
    pub openai_base_url: String,

    /// OpenAI API key
    #[serde(default)]
    pub openai_api_key: Option<String>,

    /// Model name
    #[serde(default)]
    pub model: Option<String>,

    /// Maximum context window tokens
    #[serde(default = "default_max_tokens")]
    pub max_context_tokens: usize,

    /// System prompt override
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_toolkits() -> Vec<String> {
    vec!["OutlookMail".to_string()]
}

fn default_tool_limit() -> usize {
    100
}

fn default_confirm_tools() -> Vec<String> {
    vec![
        "OutlookMail_CreateAndSendEmail".to_string(),
        "OutlookMail_ReplyToEmail".to_string(),
        "OutlookMail_SendDraftEmail".to_string(),
    ]
}

fn default_confirm_timeout() -> u64 {
    DEFAULT_CONFIRM_TIMEOUT.as_secs()
}

fn default_toolkit_url() -> String {
    TOOLKIT_BASE_URL.to_string()
}

fn default_openai_url() -> String {
    OPENAI_BASE_URL.to_string()
}

fn default_max_tokens() -> usize {
    100_000
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            toolkits: default_toolkits(),
            tools: Vec::new(),
            tool_limit: default_tool_limit(),
            confirm_tools: default_confirm_tools(),
            confirm_timeout_secs: default_confirm_timeout(),
            consent_timeout_secs: None,
            toolkit_base_url: default_toolkit_url(),
            toolkit_api_key: None,
            openai_base_url: default_openai_url(),
            openai_api_key: None,
            model: None,
            max_context_tokens: default_max_tokens(),
            system_prompt: None,
        }
    }
}

impl CliConfig {
    /// Return the default config directory path: ~/.config/mailgate/
    pub fn default_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("could not determine user config directory")?
            .join("mailgate");
        Ok(config_dir)
    }

    /// Return the default config file path.
    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join("config.toml"))
    }

    /// Load config from the given path, or the default path.
    /// Writes and returns the default config if the file does not exist.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = match path {
            Some(p) => PathBuf::from(p),
            None => Self::default_config_path()?,
        };

        if config_path.exists() {
            debug!(?config_path, "Loading config");
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read config: {}", config_path.display()))?;
            let config: Self = toml::from_str(&content)
                .with_context(|| format!("failed to parse config: {}", config_path.display()))?;
            Ok(config)
        } else {
            debug!(?config_path, "Config file not found, using defaults");
            let config = Self::default();
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent).ok();
            }
            let toml_str = toml::to_string_pretty(&config)
                .context("failed to serialize default config")?;
            std::fs::write(&config_path, toml_str).ok();
            Ok(config)
        }
    }

    /// Priority: cli/env > config file.
    pub fn resolve_toolkit_api_key(&self, cli_override: Option<&str>) -> Option<String> {
        resolve_value(cli_override, self.toolkit_api_key.as_deref())
    }

    /// Priority: cli/env > config file.
    pub fn resolve_openai_api_key(&self, cli_override: Option<&str>) -> Option<String> {
        resolve_value(cli_override, self.openai_api_key.as_deref())
    }

    /// Priority: cli/env > config file > provider default.
    pub fn resolve_model(&self, cli_override: Option<&str>) -> String {
        resolve_value(cli_override, self.model.as_deref())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    pub fn resolve_toolkit_url(&self, cli_override: Option<&str>) -> String {
        resolve_value(cli_override, Some(&self.toolkit_base_url))
            .unwrap_or_else(default_toolkit_url)
    }

    pub fn resolve_toolkits(&self, cli_override: &[String]) -> Vec<String> {
        resolve_list(cli_override, &self.toolkits)
    }

    pub fn resolve_tools(&self, cli_override: &[String]) -> Vec<String> {
        resolve_list(cli_override, &self.tools)
    }

    pub fn resolve_confirm_tools(&self, cli_override: &[String]) -> Vec<String> {
        resolve_list(cli_override, &self.confirm_tools)
    }

    /// `None` means wait forever.
    pub fn resolve_confirm_timeout(&self, cli_override: Option<u64>) -> Option<Duration> {
        match cli_override.unwrap_or(self.confirm_timeout_secs) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn consent_timeout(&self) -> Option<Duration> {
        self.consent_timeout_secs.map(Duration::from_secs)
    }
}

/// First non-empty value wins.
fn resolve_value(cli: Option<&str>, file: Option<&str>) -> Option<String> {
    [cli, file]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(String::from)
}

/// A list given on the command line replaces the configured one.
fn resolve_list(cli: &[String], file: &[String]) -> Vec<String> {
    if cli.is_empty() {
        file.to_vec()
    } else {
        cli.to_vec()
    }
}
