use anyhow::{Context, Result};
use clap::Parser;
use ghu::config::Config;
use ghu::resolution::UpdateEngine;
use ghu::store::FileStateStore;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

/// ghu - update checker for components published in GitHub or Bitbucket repositories
///
/// Checks each configured component against the tags of its remote
/// repository, and reports download links for updates and rollbacks.
///
/// GITHUB_TOKEN and BITBUCKET_TOKEN are used for authentication when set.
///
/// Examples:
///   ghu check                 # Check every component
///   ghu rollback my-theme v1.0.0
#[derive(Parser, Debug)]
#[command(author, version = env!("GHU_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Component configuration file (defaults to <config dir>/ghu/components.json)
    #[arg(long, short = 'c', env = "GHU_CONFIG", value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Saved state file (defaults to <data dir>/ghu/state.json)
    #[arg(long, env = "GHU_STATE", value_name = "PATH", global = true)]
    state: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run a resolution cycle over every component
    Check(CheckArgs),

    /// Install an older (or any) tagged version of a component
    Rollback(VersionArgs),

    /// Print the download URL of any tagged version of a component
    Link(VersionArgs),

    /// Print the saved rollback candidates of a component
    Candidates(ComponentArgs),

    /// Print the saved status of every component
    Status,
}

#[derive(clap::Args, Debug)]
struct CheckArgs {
    /// Discard saved state before checking
    #[arg(long)]
    force: bool,
}

#[derive(clap::Args, Debug)]
struct ComponentArgs {
    /// Component id
    #[arg(value_name = "ID")]
    id: String,
}

#[derive(clap::Args, Debug)]
struct VersionArgs {
    /// Component id
    #[arg(value_name = "ID")]
    id: String,

    /// Tag name, e.g. v1.0.0
    #[arg(value_name = "VERSION")]
    version: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let engine = build_engine(&cli)?;

    match cli.command {
        Commands::Check(args) => {
            let report = if args.force {
                engine.force_check().await
            } else {
                engine.run_cycle().await
            };
            print_json(&report)
        }
        Commands::Rollback(args) => {
            let state = engine.request_rollback(&args.id, &args.version).await?;
            print_json(&state)
        }
        Commands::Link(args) => {
            let url = engine.download_link_for(&args.id, &args.version).await?;
            println!("{}", url);
            Ok(())
        }
        Commands::Candidates(args) => {
            if engine.components().all(|c| c.id != args.id) {
                anyhow::bail!("Unknown component: {}", args.id);
            }
            print_json(&engine.rollback_candidates(&args.id))
        }
        Commands::Status => {
            let statuses: Vec<_> = engine
                .statuses()
                .into_iter()
                .map(|(id, status)| {
                    json!({
                        "component": id,
                        "stale": status.is_stale(),
                        "decision": status.decision,
                        "last_error": status.last_error,
                    })
                })
                .collect();
            print_json(&statuses)
        }
    }
}

fn build_engine(cli: &Cli) -> Result<UpdateEngine> {
    let config_path = cli
        .config
        .clone()
        .or_else(Config::default_path)
        .context("Cannot determine config file location; pass --config")?;
    let state_path = cli
        .state
        .clone()
        .or_else(FileStateStore::default_path)
        .context("Cannot determine state file location; pass --state")?;

    let config = Config::load(&config_path)?;
    let engine = UpdateEngine::new(
        config.components()?,
        &config.provider_factory()?,
        config.fetch_timeout(),
    )?;

    Ok(engine.with_store(Arc::new(FileStateStore::new(state_path))))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
