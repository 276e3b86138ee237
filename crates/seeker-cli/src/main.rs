use anyhow::Result;
use clap::Parser;
use console::style;
use std::path::PathBuf;
use std::sync::Arc;

use seeker::agent::Agent;
use seeker::providers::factory::get_provider;
use seeker::tools::ToolRegistry;

mod config;
mod prompt;
mod session;

use crate::config::Settings;
use crate::prompt::rustyline::RustylinePrompt;
use crate::session::Session;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Model to use, overriding the configured one
    #[arg(short, long)]
    model: Option<String>,

    /// Configuration file (defaults to ./seeker.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Answer a single question and exit
    #[arg(short, long)]
    question: Option<String>,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "seeker=debug,warn" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(model) = cli.model {
        settings.provider.model = model;
    }
    let model = settings.provider.model.clone();

    let registry = ToolRegistry::new()
        .with_tool(Arc::new(settings.search.web_search_tool()))?
        .with_tool(Arc::new(settings.search.extract_tool()))?;
    let provider = get_provider(settings.provider.into_config())?;
    let agent = Agent::new(provider, registry).with_config(settings.agent.to_agent_config());

    let prompt = RustylinePrompt::new()?;
    let mut session = Session::new(agent, Box::new(prompt));

    match cli.question {
        Some(question) => session.headless_start(&question).await,
        None => {
            println!(
                "seeker ({}) {}",
                model,
                style("- type /help for commands, /exit to end the session").dim()
            );
            session.start().await
        }
    }
}
