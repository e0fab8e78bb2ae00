//! beamkd CLI
//!
//! ```bash
//! beamkd run pipeline.toml                      # run the pipeline's commands
//! beamkd run pipeline.toml --config site.toml   # with settings from another file
//! beamkd mappers                                # list rule-set names
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use beamkd::engine::Engine;
use beamkd::error::Result;
use beamkd::settings::Settings;

#[derive(Parser)]
#[command(name = "beamkd")]
#[command(about = "Statement mining with beam search", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the commands of a pipeline file
    Run {
        /// Pipeline file (TOML)
        pipeline: PathBuf,

        /// Settings file loaded before the pipeline
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// List the available rule-sets
    Mappers {
        /// Settings file with user rule-sets
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn init_tracing(default_filter: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load(config: Option<&Path>, pipeline: Option<&Path>) -> Result<Settings> {
    let files: Vec<&Path> = config.into_iter().chain(pipeline).collect();
    Settings::load(&files)
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run { pipeline, config } => {
            let settings = load(config.as_deref(), Some(&pipeline))?;
            init_tracing(&settings.log_filter);
            let mut engine = Engine::new(&settings)?;
            engine.execute(&settings.commands)
        }
        Commands::Mappers { config } => {
            let settings = load(config.as_deref(), None)?;
            let engine = Engine::new(&settings)?;
            for name in engine.catalog().names() {
                let rules: Vec<String> = engine
                    .catalog()
                    .get(name)
                    .unwrap_or_default()
                    .iter()
                    .map(|r| r.to_string())
                    .collect();
                println!("{name}\t{}", rules.join(", "));
            }
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
