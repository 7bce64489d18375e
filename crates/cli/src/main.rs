mod cli;
mod config;
mod prompt;
mod terminal;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

use mailgate_llm::OpenAiToolProvider;
use mailgate_tool_runtime::authorization::{register_authorized, AuthorizationClient, ConsentPresenter};
use mailgate_tool_runtime::gate::ConfirmationGate;
use mailgate_tool_runtime::permission::{ConfirmationPrompter, SensitivityPolicy};
use mailgate_tool_runtime::tool::{Tool, ToolContext};
use mailgate_tool_runtime::{AgenticLoop, Conversation, ToolRegistry, TracingHooks};
use mailgate_toolkit::ToolkitClient;

use crate::cli::CliArgs;
use crate::config::CliConfig;
use crate::terminal::Terminal;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let terminal = Arc::new(Terminal::new());

    // Load config
    let config = CliConfig::load(args.config.as_deref())
        .context("failed to load configuration")?;

    let toolkit_key = config
        .resolve_toolkit_api_key(args.toolkit_api_key.as_deref())
        .context("toolkit API key not set (ARCADE_API_KEY)")?;
    let openai_key = config
        .resolve_openai_api_key(args.api_key.as_deref())
        .context("model API key not set (OPENAI_API_KEY)")?;
    let model = config.resolve_model(args.model.as_deref());

    let user_id = args.user_id.clone().filter(|id| !id.trim().is_empty());
    if user_id.is_none() {
        warn!("No user id set (ARCADE_USER_ID); tools run for the empty identity");
    }

    // Discover tools
    let toolkit = ToolkitClient::new(
        &config.resolve_toolkit_url(args.toolkit_url.as_deref()),
        &toolkit_key,
    );
    let specs = toolkit
        .discover(
            &config.resolve_toolkits(&args.toolkits),
            &config.resolve_tools(&args.tools),
            config.tool_limit,
        )
        .await
        .context("failed to discover tools")?;

    // Guard sensitive tools
    let policy = Arc::new(SensitivityPolicy::from_names(
        config.resolve_confirm_tools(&args.confirm_tools),
    ));
    let gate = Arc::new(
        ConfirmationGate::new(policy, terminal.clone() as Arc<dyn ConfirmationPrompter>)
            .with_timeout(config.resolve_confirm_timeout(args.confirm_timeout)),
    );
    let candidates: Vec<Arc<dyn Tool>> = toolkit
        .remote_tools(specs)
        .into_iter()
        .map(|tool| gate.wrap(tool))
        .collect();

    // Authorize each tool once; refused tools are left out
    let auth = AuthorizationClient::new(
        Arc::new(toolkit.clone()),
        terminal.clone() as Arc<dyn ConsentPresenter>,
    )
    .with_consent_timeout(config.consent_timeout());
    let mut registry = ToolRegistry::new();
    let report = register_authorized(&mut registry, &auth, candidates, user_id.as_deref())
        .await
        .context("tool authorization failed")?;
    for (name, reason) in &report.excluded {
        terminal.print_info(&format!("Skipping {}: {}", name, reason))?;
    }
    info!(tools = report.registered.len(), "Tools ready");

    // Create agentic loop
    let provider = Arc::new(OpenAiToolProvider::new(
        openai_key,
        model.clone(),
        config.openai_base_url.clone(),
    ));
    let agentic_loop = AgenticLoop::new(provider, Arc::new(registry))
        .with_hooks(Arc::new(TracingHooks::new("mail agent")))
        .with_max_iterations(args.max_iterations);

    let system_prompt = args
        .system_prompt
        .clone()
        .or_else(|| config.system_prompt.clone())
        .unwrap_or_else(|| prompt::DEFAULT_SYSTEM_PROMPT.to_string());
    let mut conversation =
        Conversation::new(config.max_context_tokens).with_system_prompt(system_prompt);
    let tool_context = ToolContext::for_user(user_id.clone());

    terminal.print_banner(&model, user_id.as_deref(), &report.registered)?;

    // REPL loop
    loop {
        let input = match terminal.read_input().await? {
            Some(text) => text,
            None => {
                terminal.print_info("Goodbye!")?;
                break;
            }
        };

        if input.is_empty() {
            continue;
        }

        match agentic_loop
            .run(&mut conversation, input, &tool_context)
            .await
        {
            Ok(outcome) => {
                for event in &outcome.events {
                    terminal.display_event(event)?;
                }
                if outcome.is_cancelled() {
                    if let Some(text) = conversation.last_assistant_text() {
                        terminal.print_assistant(text)?;
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Agentic loop error");
                terminal.print_error(&format!("{:#}", e))?;
            }
        }
    }

    Ok(())
}
