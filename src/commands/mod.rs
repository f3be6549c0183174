pub mod init_db;
pub mod logs;
pub mod ping;
pub mod smoke_test;
pub mod train;
pub mod watch;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{self, Profile};
use crate::db;
use crate::gateway::LogGateway;
use crate::output::OutputFormat;
use crate::serve;

pub enum Command {
    /// Runs on the blocking client, outside any async runtime.
    InitDb { file: Option<String> },
    Live(LiveCommand),
}

pub enum LiveCommand {
    Ping,
    SmokeTest,
    Logs,
    Watch,
    Train { epochs: u32, interval: Duration },
    Serve { addr: Option<String> },
}

pub fn run(
    command: Command,
    profile_name: &str,
    db_override: Option<&str>,
    format: &OutputFormat,
) -> Result<(), String> {
    let profile = config::load_config(profile_name).map_err(|e| e.to_string())?;
    let conn_str = profile
        .resolve_connection(db_override)
        .map_err(|e| e.to_string())?;

    match command {
        Command::InitDb { file } => init_db::run(&conn_str, file.as_deref()),
        Command::Live(live) => {
            let runtime = tokio::runtime::Runtime::new()
                .map_err(|e| format!("Failed to start runtime: {e}"))?;
            runtime.block_on(async {
                let gateway = db::open_gateway(&conn_str);
                run_live(live, gateway, &profile, format).await
            })
        }
    }
}

async fn run_live(
    command: LiveCommand,
    gateway: Arc<dyn LogGateway>,
    profile: &Profile,
    format: &OutputFormat,
) -> Result<(), String> {
    match command {
        LiveCommand::Ping => ping::run(gateway.as_ref()).await,
        LiveCommand::SmokeTest => smoke_test::run(gateway.as_ref()).await,
        LiveCommand::Logs => logs::run(gateway, profile.fetch_timeout(), format).await,
        LiveCommand::Watch => watch::run(gateway, profile.fetch_timeout(), format).await,
        LiveCommand::Train { epochs, interval } => {
            train::run(gateway.as_ref(), epochs, interval).await
        }
        LiveCommand::Serve { addr } => serve::run(gateway, profile, addr.as_deref()).await,
    }
}
