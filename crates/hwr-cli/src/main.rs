//! HWR CLI - console for the handwriting-recognition training platform
//!
//! The main entry point for the `hwr` command-line tool.
//!
//! # Commands
//! - `hwr login` - Log in with captcha verification
//! - `hwr logout` - Log out and clear the session
//! - `hwr datasets` - List, delete and select datasets
//! - `hwr models` - List, apply and delete models
//! - `hwr logs` - View operation logs
//! - `hwr train` - Start, stop and watch training runs
//! - `hwr status` - Show session and service status
//!
//! @version 0.1.0

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::uninlined_format_args)]

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod cli;
mod commands;
mod error;

use cli::{Cli, Commands};
use commands::Context;
use error::{CliError, CliResult};

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let ctx = Context::load(cli.config.as_deref())?;

    tokio::runtime::Runtime::new()
        .map_err(CliError::Io)?
        .block_on(dispatch(ctx, cli.command))
}

async fn dispatch(ctx: Context, command: Commands) -> CliResult<()> {
    match command {
        Commands::Login(args) => commands::auth::login(&ctx, &args).await,
        Commands::Logout => commands::auth::logout(&ctx).await,
        Commands::Datasets(args) => commands::datasets::execute(&ctx, args).await,
        Commands::Models(args) => commands::models::execute(&ctx, args).await,
        Commands::Logs(args) => commands::logs::execute(&ctx, &args).await,
        Commands::Train(args) => commands::train::execute(&ctx, args).await,
        Commands::Status => commands::status::execute(&ctx).await,
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "hwr=debug,hwr_console=debug"
    } else {
        "hwr=info,hwr_console=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
