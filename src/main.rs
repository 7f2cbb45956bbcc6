use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kiss_runtime::config::file::config_file_path;
use kiss_runtime::{Config, PluginManager};

/// Kiss - host for dynamically loaded plugins
#[derive(Parser)]
#[command(name = "kiss", version, about)]
struct Cli {
    /// Runtime configuration file (default: ~/.config/kiss/runtime.json)
    #[arg(env = "KISS_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Load plugins, start services and run until interrupted
    Run,
    /// List loaded plugins and their capabilities
    List {
        /// Print capabilities as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run a skill plugin once
    Skill {
        /// Plugin name from its manifest
        name: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,kiss_runtime=info",
        1 => "info,kiss_runtime=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let path = cli
        .config
        .or_else(config_file_path)
        .ok_or_else(|| anyhow::anyhow!("no configuration file given and no home directory"))?;

    let config = Config::load(&path)?;
    let manager = load_plugins(&config);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => cmd_run(manager).await,
        Command::List { json } => cmd_list(&manager, json),
        Command::Skill { name } => cmd_skill(&manager, &name),
    }
}

/// Build the plugin manager from configuration
fn load_plugins(config: &Config) -> PluginManager {
    let mut manager = PluginManager::new();

    let loaded = if config.libraries.is_empty() {
        manager.load_dir(&config.plugin_dir)
    } else {
        manager.load_all(&config.libraries, &config.plugin_dir)
    };

    tracing::info!(
        plugin_dir = %config.plugin_dir.display(),
        count = loaded.len(),
        "plugins loaded"
    );

    manager
}

async fn cmd_run(mut manager: PluginManager) -> anyhow::Result<()> {
    let started = manager.start_services()?;
    tracing::info!(services = started, "kiss runtime ready");

    // Run until interrupted
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");

    drop(manager);
    Ok(())
}

fn cmd_list(manager: &PluginManager, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&manager.capability_infos())?);
        return Ok(());
    }

    if manager.is_empty() {
        println!("No plugins loaded");
        return Ok(());
    }

    for plugin in manager.list() {
        println!("{} {} ({})", plugin.name(), plugin.version(), plugin.kind());
        for capability in plugin.capabilities() {
            match capability.signature() {
                Some(signature) => println!("  {}: {signature}", capability.name()),
                None => println!("  {}", capability.name()),
            }
        }
    }

    Ok(())
}

fn cmd_skill(manager: &PluginManager, name: &str) -> anyhow::Result<()> {
    let code = manager.run_skill(name)?;
    println!("{name} returned {code}");
    Ok(())
}
