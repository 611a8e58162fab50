//! rustible-azure - Azure Resource Manager modules for Rustible
//!
//! This is the main entry point for the rustible-azure CLI.

mod cli;

use anyhow::Result;
use cli::commands::{doc, CommandContext};
use cli::{Cli, Commands};
use rustible_azure::config::{Config, LogFormat, LoggingConfig};
use rustible_azure::error::Error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Application version information
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    let exit_code = match run(&cli).await {
        Ok(code) => code,
        Err(e) => report(&cli, &e),
    };

    std::process::exit(exit_code);
}

async fn run(cli: &Cli) -> Result<i32> {
    // Completions need neither config nor logging
    if let Commands::Completions(args) = &cli.command {
        return Ok(args.execute());
    }

    let config = Config::load(cli.config.as_deref())?;
    init_logging(cli.verbosity(), &config.logging);

    if cli.verbosity() >= 2 {
        tracing::debug!("rustible-azure v{}", VERSION);
    }

    let mut ctx = CommandContext::new(cli, config);

    match &cli.command {
        Commands::Run(args) => args.execute(&mut ctx).await,
        Commands::Ansible(args) => args.execute(&mut ctx).await,
        Commands::List => doc::list(&ctx),
        Commands::Doc(args) => args.execute(&ctx),
        Commands::Completions(args) => Ok(args.execute()),
    }
}

/// Print an error and pick the exit code: 2 for usage errors, 1 otherwise
fn report(cli: &Cli, err: &anyhow::Error) -> i32 {
    // Ansible parses stdout, so failures there are always JSON
    let json = cli.is_json() || matches!(cli.command, Commands::Ansible(_));
    let output = cli::output::OutputFormatter::new(!cli.no_color, json, cli.verbosity());
    output.error(&format!("{:#}", err));

    err.downcast_ref::<Error>().map_or(1, Error::exit_code)
}

/// Initialize logging based on verbosity level and the `[logging]` config.
///
/// `RUST_LOG` wins over `-v`, which wins over the configured level.
fn init_logging(verbosity: u8, logging: &LoggingConfig) {
    let filter = match verbosity {
        0 => logging.level.clone().unwrap_or_else(|| "warn".to_string()),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let registry = tracing_subscriber::registry().with(env_filter);

    match logging.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .init(),
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_target(verbosity >= 3)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}
