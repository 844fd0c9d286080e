//! CLI - Command Line Interface Definitions
//!
//! Defines the CLI structure using clap derive macros.
//!
//! @version 0.1.0

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

// =============================================================================
// Main CLI Structure
// =============================================================================

/// hwr - console for the handwriting-recognition training platform
#[derive(Parser, Debug)]
#[command(
    name = "hwr",
    version,
    about = "HWR console - manage datasets and models, run and watch training",
    long_about = "Command line console for the handwriting-recognition training platform.\n\n\
                  Log in first; every other page of the console requires a session."
)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to configuration file (defaults to ~/.hwr/config.toml)
    #[arg(short, long, global = true, env = "HWR_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

// =============================================================================
// Subcommands
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in with a user id, password and captcha
    Login(LoginArgs),

    /// Log out and clear the stored session
    Logout,

    /// Manage datasets
    Datasets(DatasetsArgs),

    /// Manage trained models
    Models(ModelsArgs),

    /// View operation logs
    Logs(LogsArgs),

    /// Start, stop and watch training runs
    Train(TrainArgs),

    /// Show session and service status
    Status,
}

// =============================================================================
// Auth
// =============================================================================

/// Arguments for the `login` command
#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Numeric user id (prompted when omitted)
    #[arg(short, long)]
    pub user: Option<i64>,

    /// Password (prompted when omitted)
    #[arg(short, long)]
    pub password: Option<String>,

    /// Where to write the captcha image
    #[arg(long, default_value = "captcha.png")]
    pub captcha_out: PathBuf,
}

// =============================================================================
// Datasets / Models / Logs
// =============================================================================

/// Arguments for the `datasets` command
#[derive(Args, Debug)]
pub struct DatasetsArgs {
    #[command(subcommand)]
    pub action: DatasetsSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum DatasetsSubcommand {
    /// List datasets with their image counts
    List,
    /// Delete a dataset
    Delete {
        /// Dataset name
        name: String,
    },
    /// Select the dataset used for training
    Select {
        /// Dataset name
        name: String,
    },
}

/// Arguments for the `models` command
#[derive(Args, Debug)]
pub struct ModelsArgs {
    #[command(subcommand)]
    pub action: ModelsSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum ModelsSubcommand {
    /// List trained models
    List,
    /// Make a model the active recognition model
    Apply {
        /// Model name
        name: String,
    },
    /// Delete a model
    Delete {
        /// Model name
        name: String,
    },
}

/// Arguments for the `logs` command
#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Show only the most recent entries
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

// =============================================================================
// Training
// =============================================================================

/// Arguments for the `train` command
#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(subcommand)]
    pub action: TrainSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum TrainSubcommand {
    /// Start a training run and follow it until it ends
    Start(StartArgs),
    /// Ask the running training to stop
    Stop,
    /// Follow training events as they arrive
    Watch(WatchArgs),
    /// Show the training configuration and available architectures
    Config,
    /// Show the training service's log history
    History,
    /// Check the training service health
    Health,
}

/// Arguments for `train start`
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Model architecture (CNN or MLP)
    #[arg(short, long, default_value = "CNN")]
    pub architecture: String,

    /// Batch size
    #[arg(short, long, default_value = "64")]
    pub batch_size: u32,

    /// Learning rate
    #[arg(short, long, default_value = "0.001")]
    pub learning_rate: f64,

    /// Optimizer name
    #[arg(short, long, default_value = "Adam")]
    pub optimizer: String,

    /// Loss function
    #[arg(long, default_value = "交叉熵")]
    pub loss: String,

    /// Number of epochs
    #[arg(short, long)]
    pub epochs: Option<u32>,

    /// Dataset to train on
    #[arg(short, long)]
    pub dataset: Option<String>,

    /// Name to save the model under
    #[arg(short, long)]
    pub save_name: Option<String>,

    /// Return right after the run is requested
    #[arg(long)]
    pub detach: bool,
}

/// Arguments for `train watch`
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Stop watching after this many seconds
    #[arg(short, long)]
    pub timeout: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_train_start() {
        let cli = Cli::parse_from(["hwr", "train", "start", "-a", "MLP", "-e", "5", "--detach"]);
        match cli.command {
            Commands::Train(TrainArgs {
                action: TrainSubcommand::Start(args),
            }) => {
                assert_eq!(args.architecture, "MLP");
                assert_eq!(args.epochs, Some(5));
                assert_eq!(args.batch_size, 64);
                assert!(args.detach);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
