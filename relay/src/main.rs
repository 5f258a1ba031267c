mod config;
mod observability;

use clap::{Args, Parser, Subcommand};
use config::{Config, ConfigError};
use observability::ObservabilityError;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "relay", version, about = "Relays product reviews to store metafields")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run the review relay
    Reviews(ConfigArgs),
    /// Load and validate the configuration, then exit
    ValidateConfig(ConfigArgs),
    /// List the metrics emitted by the relay
    Metrics,
}

#[derive(Args)]
struct ConfigArgs {
    /// YAML config file. Environment variables override its values.
    #[arg(long, env = "RELAY_CONFIG")]
    config_file: Option<PathBuf>,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Observability(#[from] ObservabilityError),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    Reviews(#[from] reviews::ReviewsError),
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: CliCommand) -> Result<(), CliError> {
    match command {
        CliCommand::Reviews(args) => {
            let config = Config::load(args.config_file.as_deref())?;
            let reviews_config = config.reviews_config(env_lookup)?;

            let _sentry = observability::init_logging(config.common.logging.as_ref())?;
            if let Some(metrics_config) = &config.common.metrics {
                observability::init_metrics(metrics_config)?;
            }

            tracing::info!("Starting review relay");
            let rt = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            rt.block_on(reviews::run(reviews_config))?;
        }
        CliCommand::ValidateConfig(args) => {
            let config = Config::load(args.config_file.as_deref())?;
            config.reviews_config(env_lookup)?;
            println!("config ok");
        }
        CliCommand::Metrics => {
            for def in reviews::metrics_defs::ALL_METRICS {
                println!(
                    "{}\t{}\t{}",
                    def.name,
                    def.metric_type.as_str(),
                    def.description
                );
            }
        }
    }
    Ok(())
}
