use std::path::PathBuf;

use anyhow::bail;
use clap::{Parser, Subcommand};
use tandem::actor::grouper::replay::{Replay, Script};
use tandem::common::config::{Config, DEFAULT_CONFIG, config_file};
use tandem::common::log;

#[derive(Parser)]
#[command(name = "tandem")]
#[command(about = "Groups tiled neighbour windows so they come to the front together")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a RON script against the scripted window system and print the
    /// resulting groups as JSON
    Replay {
        script: PathBuf,
        /// Use the settings from this config file instead of the script's
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print the report on a single line
        #[arg(long)]
        compact: bool,
    },
    /// Configuration helpers
    Config {
        #[command(subcommand)]
        config: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Check a config file for problems (defaults to ~/.tandem.toml)
    Check { path: Option<PathBuf> },
    /// Print the built-in default config
    Default,
}

fn main() -> anyhow::Result<()> {
    log::init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay { script, config, compact } => {
            let mut script = Script::read(&script)?;
            if let Some(path) = config {
                script.settings = Config::read(&path)?.settings;
            }
            let report = Replay::run(&script)?;
            let json = if compact {
                serde_json::to_string(&report)?
            } else {
                serde_json::to_string_pretty(&report)?
            };
            println!("{json}");
        }
        Commands::Config { config: ConfigCommands::Check { path } } => {
            let path = path.unwrap_or_else(config_file);
            let config = Config::read(&path)?;
            let issues = config.validate();
            if !issues.is_empty() {
                for issue in &issues {
                    eprintln!("{issue}");
                }
                bail!("{} issue(s) in {}", issues.len(), path.display());
            }
            println!("{}: ok", path.display());
        }
        Commands::Config { config: ConfigCommands::Default } => print!("{DEFAULT_CONFIG}"),
    }

    Ok(())
}
