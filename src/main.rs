use anyhow::Context;
use browser_agent::cli::{Cli, Commands, ServeArgs};
use browser_agent::credential::CredentialStore;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;

// Not `#[tokio::main]`: each request builds its own runtime, and a runtime
// cannot be started from inside another.
fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let config = match cli.load_config().context("Failed to load config") {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    let credentials = Arc::new(CredentialStore::from_env(&config.api_key_env));

    match cli.command {
        Some(Commands::Run(args)) => browser_agent::cli::run(&args, &config, credentials),
        Some(Commands::Serve(args)) => browser_agent::cli::serve(&args, &config, credentials),
        None => browser_agent::cli::serve(&ServeArgs::default(), &config, credentials),
    }
}

/// Log to `browser-agent.log` if `BROWSER_AGENT_LOG` is set, else to stderr
/// filtered by `RUST_LOG`.
fn init_logging() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::prelude::*;

    if std::env::var("BROWSER_AGENT_LOG").is_ok() {
        match std::fs::File::create("browser-agent.log") {
            Ok(file) => {
                let file_layer = tracing_subscriber::fmt::layer()
                    .with_writer(file)
                    .with_ansi(false);
                let filter = EnvFilter::new("browser_agent=debug");
                let _ = tracing_subscriber::registry()
                    .with(file_layer.with_filter(filter))
                    .try_init();
            }
            Err(err) => {
                eprintln!("Failed to create log file: {err}");
            }
        }
    } else {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("browser_agent=info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }
}
