mod cli;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, error, info};
use syslog::{BasicLogger, Facility, Formatter3164};

use tt_fanctl::{application::Application, config::Config};

use crate::cli::Cli;

fn init_log(level: LevelFilter) -> Result<()> {
    syslog::unix(Formatter3164 {
        facility: Facility::LOG_USER,
        hostname: None,
        process: "tt_fanctl".into(),
        pid: std::process::id(),
    })
    .map_err(|e| anyhow!("{e}"))
    .and_then(|logger| {
        log::set_boxed_logger(Box::new(BasicLogger::new(logger)))
            .map(|_| log::set_max_level(level))
            .map_err(|e| anyhow!("{e}"))
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, path) = Config::load(cli.config)?;
    if cli.dump_config {
        print!(
            "{}",
            serde_yaml::to_string(&config).context("Failed to serialize configuration")?
        );
        return Ok(());
    }

    init_log(cli.log_level)?;
    info!("tt_fanctl {} starting", env!("CARGO_PKG_VERSION"));

    let app = Application::builder()
        .with_config(config, path)
        .build()
        .inspect_err(|e| error!("Startup failed: {e:#}"))?;

    app.run()
        .await
        .inspect_err(|e| error!("{e:#}"))
}
