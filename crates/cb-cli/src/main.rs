use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use cb_cli::bootstrap::{self, RuntimeConfig};
use cb_cli::config::AppConfig;
use cb_cli::{logging, pipeline};

#[derive(Parser)]
#[command(name = "cb", about = "consensus-bridge annotation response unifier")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to the configuration file.
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Validate configuration file and exit.
    Validate,
    /// Unify annotator responses and emit text-classification examples.
    Unify {
        /// JSON array of records.
        #[arg(short, long)]
        records: PathBuf,
        /// Output file; stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    let runtime = load_runtime(&cli.config);

    if let Err(e) = logging::init(&runtime.log_level, runtime.log_format) {
        eprintln!("Error initialising logging: {e:#}");
        std::process::exit(1);
    }

    match cli.command {
        Command::Validate => {
            println!(
                "Config valid: {} ({})",
                cli.config.display(),
                runtime.summary()
            );
        }
        Command::Unify { records, output } => {
            match pipeline::run_unify(&runtime, &records, output.as_deref()) {
                Ok(prepared) => {
                    eprintln!(
                        "Prepared {} examples ({} records without text, {} unlabeled)",
                        prepared.examples.len(),
                        prepared.skipped_missing_text,
                        prepared.skipped_unlabeled
                    );
                }
                Err(e) => {
                    eprintln!("Unify failed: {e:#}");
                    std::process::exit(1);
                }
            }
        }
    }
}

fn load_runtime(path: &Path) -> RuntimeConfig {
    let config = match AppConfig::from_file(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error reading config: {e:#}");
            std::process::exit(1);
        }
    };

    match bootstrap::into_runtime(config) {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Config invalid: {e:#}");
            std::process::exit(1);
        }
    }
}
