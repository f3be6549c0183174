use std::time::Duration;

use clap::{Parser, Subcommand};
use growthlog::commands::{self, Command, LiveCommand};
use growthlog::output::OutputFormat;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "growthlog", version, about = "RL trader training metrics feed")]
struct Cli {
    /// Postgres connection string, or `memory` (overrides config)
    #[arg(long, global = true)]
    db: Option<String>,

    /// Config profile to use
    #[arg(long, global = true, default_value = "default")]
    profile: String,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "table")]
    format: OutputFormat,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Create the log table and its insert notification trigger
    InitDb {
        /// Apply this SQL file instead of the built-in schema
        #[arg(long)]
        file: Option<String>,
    },

    /// Test the connection and report the row count
    Ping,

    /// Check the connection, then upload one sample record
    SmokeTest,

    /// Fetch and print the full history, ordered by epoch
    Logs,

    /// Print the history, then stream new records as they are inserted
    Watch,

    /// Run a mock training session that uploads synthetic metrics
    Train {
        /// Number of epochs to upload
        #[arg(long, default_value = "5")]
        epochs: u32,

        /// Pause between epochs, in milliseconds
        #[arg(long, default_value = "1000")]
        interval_ms: u64,
    },

    /// Serve the store over HTTP and WebSocket for the dashboard
    Serve {
        /// Listen address (overrides config)
        #[arg(long)]
        addr: Option<String>,
    },
}

impl From<CliCommand> for Command {
    fn from(command: CliCommand) -> Self {
        match command {
            CliCommand::InitDb { file } => Command::InitDb { file },
            CliCommand::Ping => Command::Live(LiveCommand::Ping),
            CliCommand::SmokeTest => Command::Live(LiveCommand::SmokeTest),
            CliCommand::Logs => Command::Live(LiveCommand::Logs),
            CliCommand::Watch => Command::Live(LiveCommand::Watch),
            CliCommand::Train {
                epochs,
                interval_ms,
            } => Command::Live(LiveCommand::Train {
                epochs,
                interval: Duration::from_millis(interval_ms),
            }),
            CliCommand::Serve { addr } => Command::Live(LiveCommand::Serve { addr }),
        }
    }
}

fn init_tracing() {
    // stderr, so `--format json` output on stdout stays parseable
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let command = Command::from(cli.command);

    if let Err(e) = commands::run(command, &cli.profile, cli.db.as_deref(), &cli.format) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
