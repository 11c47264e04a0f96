use anyhow::Context;
use clap::{Parser, Subcommand};
use linkclaw::agent::AgentLoop;
use linkclaw::automation::HttpAutomationClient;
use linkclaw::capture::HttpScreenshotCache;
use linkclaw::orchestrator::{Action, ActionOrchestrator};
use linkclaw::providers::OpenAiResponsesService;
use linkclaw::selectors::{Feature, MemorySelectorStore, SeedTable, SelectorStore};
use linkclaw::tools::{catalog, ToolDispatcher};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "linkclaw", version, about = "Self-healing browser-automation agent")]
struct Cli {
    /// Path to config.toml (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute one high-level action and print the JSON outcome
    #[command(long_about = "\
Execute one high-level action and print the JSON outcome.

Examples:
  linkclaw run read_chat '{\"profileUrl\":\"https://example/in/alice\",\"limit\":3}'
  linkclaw run send_message '{\"profileUrl\":\"https://example/in/alice\",\"message\":\"hi\"}'")]
    Run {
        /// Action name (read_chat, send_message, send_connection)
        action: String,
        /// Action payload as JSON
        payload: String,
    },
    /// List the tool catalog advertised to the model
    Tools,
    /// Show current locator candidates for a feature
    Selectors {
        /// Feature wire name (e.g. conversation_root)
        feature: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default tracing subscriber")?;

    let cli = Cli::parse();
    let config = linkclaw::config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { action, payload } => {
            let payload: serde_json::Value =
                serde_json::from_str(&payload).context("payload is not valid JSON")?;
            let action: Action =
                serde_json::from_value(json!({ "action": action, "payload": payload }))
                    .context("unsupported action or payload shape")?;

            let store = Arc::new(MemorySelectorStore::new(SeedTable::new(
                &config.selectors.extra_seeds,
            )));
            let automation = Arc::new(HttpAutomationClient::new(
                &config.automation.base_url,
                config.automation.request_timeout_secs,
            )?);
            let screenshots = Arc::new(HttpScreenshotCache::new(
                &config.capture.base_url,
                config.capture.request_timeout_secs,
            )?);
            let dispatcher = ToolDispatcher::new(
                store,
                automation,
                screenshots,
                config.automation.dispatch_settings(),
            );
            let completion = Arc::new(OpenAiResponsesService::new(
                config.provider.base_url.as_deref(),
                config.provider.resolve_api_key().as_deref(),
            ));
            let agent = AgentLoop::new(
                completion,
                dispatcher,
                config.provider.model.as_str(),
                config.agent.max_iterations,
            );

            let outcome = ActionOrchestrator::new(agent).run(&action).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Tools => {
            for tool in catalog::catalog() {
                println!("{:<22} {}", tool.name, tool.description);
            }
        }
        Commands::Selectors { feature } => {
            let feature = Feature::parse(&feature)
                .with_context(|| format!("unknown feature '{feature}'"))?;
            let store =
                MemorySelectorStore::new(SeedTable::new(&config.selectors.extra_seeds));
            let entry = store.entry(feature);
            println!("{}", serde_json::to_string_pretty(&entry)?);
        }
    }

    Ok(())
}
