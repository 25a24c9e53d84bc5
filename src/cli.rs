//! Command-line surface: the web UI by default, or a one-shot command.

use crate::config::Config;
use crate::credential::CredentialStore;
use crate::server::{self, App};
use crate::session::{RequestExecutor, Session};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "browser-agent", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file (defaults to the user config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the web UI (default)
    Serve(ServeArgs),
    /// Run a single browsing command and print the result
    Run(RunArgs),
}

#[derive(Parser, Debug, Default)]
pub struct ServeArgs {
    /// Address to listen on, overriding the config
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// The command, e.g. "go to wikipedia.org and summarize the page"
    #[arg(required = true, num_args = 1..)]
    pub command: Vec<String>,
}

impl RunArgs {
    #[must_use]
    pub fn command_text(&self) -> String {
        self.command.join(" ")
    }
}

impl Cli {
    /// Load the config named by `--config`, or the default one.
    pub fn load_config(&self) -> Result<Config> {
        match &self.config {
            Some(path) => Config::load_from(path),
            None => Config::load(),
        }
    }
}

pub fn serve(args: &ServeArgs, config: &Config, credentials: Arc<CredentialStore>) -> ExitCode {
    let bind = args.bind.as_deref().unwrap_or(&config.server.bind);
    let app = App::new(RequestExecutor::for_browser(config, credentials));
    match server::serve(bind, app) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// One-shot mode: the result goes to stdout, failures to stderr.
pub fn run(args: &RunArgs, config: &Config, credentials: Arc<CredentialStore>) -> ExitCode {
    match run_command(args, config, credentials) {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run_command(
    args: &RunArgs,
    config: &Config,
    credentials: Arc<CredentialStore>,
) -> crate::Result<String> {
    let executor = RequestExecutor::for_browser(config, credentials);
    let mut session = Session::new();
    Ok(executor.try_execute(&mut session, &args.command_text())?)
}
