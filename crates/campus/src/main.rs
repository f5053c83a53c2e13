//! Command-line driver for the campus engine.

use anyhow::Context;
use campus::config::CampusConfig;
use campus::core::Engine;
use campus::script::{parse_script, replay};
use clap::{Parser, Subcommand};
use log::{debug, info};
use std::path::{Path, PathBuf};

/// Command-line options for the campus engine.
#[derive(Parser)]
#[command(name = "campus", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a JSONL script of actions and events and print the result
    Replay {
        /// Script with one `{"kind": "action" | "event", ...}` object per line
        script: PathBuf,
        /// Optional path to a campus.json5 config file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Only print the state visible to this institution
        #[arg(long)]
        tenant: Option<String>,
        /// Write the resulting state here instead of stdout
        #[arg(long)]
        state_out: Option<PathBuf>,
    },
    /// Print the effective configuration
    Config {
        /// Optional path to a campus.json5 config file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    campus::init_logging();

    let cli = Cli::parse();
    match cli.command {
        Command::Replay {
            script,
            config,
            tenant,
            state_out,
        } => run_replay(&script, config.as_deref(), tenant.as_deref(), state_out.as_deref()),
        Command::Config { config } => {
            let config = load_config(config.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn run_replay(
    script: &Path,
    config: Option<&Path>,
    tenant: Option<&str>,
    state_out: Option<&Path>,
) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let contents = std::fs::read_to_string(script)
        .with_context(|| format!("failed to read script {}", script.display()))?;
    let steps = parse_script(&contents)
        .with_context(|| format!("failed to parse script {}", script.display()))?;
    info!(
        "replaying script (path={}, steps={})",
        script.display(),
        steps.len()
    );

    let engine = Engine::new(config).context("failed to start engine")?;
    let summary = replay(&engine, &steps)?;
    let rendered = match tenant {
        Some(tenant) => serde_json::to_string_pretty(&engine.scoped(tenant))?,
        None => serde_json::to_string_pretty(engine.snapshot().as_ref())?,
    };
    engine.shutdown();

    match state_out {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("failed to write state to {}", path.display()))?;
            info!("state written (path={})", path.display());
        }
        None => println!("{rendered}"),
    }
    eprintln!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<CampusConfig> {
    if let Some(path) = path {
        info!("loading config from path: {}", path.display());
        return CampusConfig::load_from_path(path).context("failed to load config");
    }
    let cwd = std::env::current_dir().context("cwd")?;
    info!("loading layered config from cwd: {}", cwd.display());
    let layered = CampusConfig::load_layered(&cwd).context("failed to load layered config")?;
    debug!("layered config loaded (layers={})", layered.layers.len());
    Ok(layered.config)
}
