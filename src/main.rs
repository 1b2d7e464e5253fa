use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use simcopilot::agent;
use simcopilot::backend::{AgentBackend, HttpBackend};
use simcopilot::config::{Config, EnvOverrides};
use simcopilot::dispatch::{DispatchController, Settlement, SubmitOutcome};
use simcopilot::ui;

#[derive(Parser)]
#[command(name = "simcopilot")]
#[command(version)]
#[command(about = "Chat with CAD, meshing and simulation assistant agents", long_about = None)]
struct Cli {
    /// Agent backend base URL (overrides config and environment)
    #[arg(long, global = true)]
    backend_url: Option<String>,

    /// Path to the config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive client (default)
    Chat {
        /// Skip the picker and talk to this agent
        #[arg(long, short)]
        agent: Option<String>,
    },
    /// List the available agents
    Agents,
    /// Send one message to an agent and print the reply
    Ask {
        agent: String,
        #[arg(required = true, trailing_var_arg = true)]
        message: Vec<String>,
    },
    /// Check that the agent backend is reachable
    Ping,
    /// Write a config file with the current settings
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl Commands {
    fn is_interactive(&self) -> bool {
        matches!(self, Commands::Chat { .. })
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match load_config(&cli) {
        Ok(config) => run(cli, config).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_env(&EnvOverrides::from_env())?;
    if let Some(url) = &cli.backend_url {
        config.backend_url = url.clone();
    }
    Ok(config)
}

/// Route logs to a file while the TUI owns the terminal, stderr otherwise.
fn init_tracing(log_level: &str, config: &Config, interactive: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if interactive {
        let log_dir = config.log_dir();
        fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_dir.join("simcopilot.log"))
            .context("Failed to open log file")?;
        fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    let command = cli.command.unwrap_or(Commands::Chat { agent: None });
    init_tracing(&cli.log_level, &config, command.is_interactive())?;

    match command {
        Commands::Chat { agent: requested } => {
            let initial = match requested {
                Some(id) => Some(agent::resolve(&id)?),
                None => config.default_agent()?,
            };
            let backend = HttpBackend::new(config.backend_url.clone())?;
            info!(backend = %config.backend_url, "starting interactive session");
            ui::run(Arc::new(backend), config, initial).await
        }
        Commands::Agents => {
            list_agents();
            Ok(())
        }
        Commands::Ask { agent, message } => ask(&config, &agent, &message.join(" ")).await,
        Commands::Ping => ping(&config).await,
        Commands::InitConfig { force } => {
            let path = cli.config.unwrap_or_else(Config::default_path);
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            config.save(&path)?;
            println!("✅ Wrote {}", path.display());
            Ok(())
        }
    }
}

fn list_agents() {
    println!("📋 Available agents:\n");
    for info in agent::all() {
        println!("  {} {:<11} {}", info.icon, info.id.as_ref(), info.display_name);
        println!("     {}", info.description);
        println!("     POST {}\n", info.endpoint_path);
    }
}

async fn ask(config: &Config, agent_id: &str, message: &str) -> Result<()> {
    let info = agent::resolve(agent_id)?;
    let backend = HttpBackend::new(config.backend_url.clone())?;
    let mut controller = DispatchController::new(Arc::new(backend), config.request_timeout());

    controller.select_agent(info.id);
    controller.update_draft(message);

    let outcome = controller.submit().await;
    let reply = controller
        .session()
        .transcript()
        .last()
        .map(|turn| turn.content().to_string())
        .unwrap_or_default();

    match outcome {
        SubmitOutcome::Rejected(rejection) => bail!("{rejection}"),
        SubmitOutcome::Settled(Settlement::Replied) => {
            println!("{reply}");
            Ok(())
        }
        SubmitOutcome::Settled(Settlement::Failed(kind)) => {
            println!("{reply}");
            bail!("{} request failed ({kind:?})", info.display_name)
        }
        SubmitOutcome::Settled(Settlement::Stale) => bail!("exchange was abandoned"),
    }
}

async fn ping(config: &Config) -> Result<()> {
    let backend = HttpBackend::new(config.backend_url.clone())?;
    let message = backend
        .health()
        .await
        .with_context(|| format!("Backend at {} is not reachable", config.backend_url))?;
    println!("🟢 {} · {}", config.backend_url, message);
    Ok(())
}
