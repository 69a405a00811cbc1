pub mod agenda;
pub mod backup;
mod cli;
pub mod db;
pub mod models;
pub mod planner;
pub mod scheduler;
pub mod settings;
mod utils;

use std::{env, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::{info, warn};

use cli::Cli;
use db::Database;
use scheduler::{LogNotificationSink, LoggingDndController, ReminderScheduler, DEFAULT_REPLAN_INTERVAL_SECS};
use settings::SettingsStore;

pub(crate) struct AppState {
    pub(crate) db: Database,
    pub(crate) settings: Arc<SettingsStore>,
    pub(crate) scheduler: ReminderScheduler,
    pub(crate) replan_interval: Duration,
}

impl AppState {
    fn open(data_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let db = Database::open(data_dir.join("kirara.sqlite3"))?;
        let settings = SettingsStore::new(data_dir.join("settings.json"))?;
        let scheduler = ReminderScheduler::new(
            Arc::new(LogNotificationSink),
            Arc::new(LoggingDndController::default()),
        );

        Ok(Self {
            db,
            settings: Arc::new(settings),
            scheduler,
            replan_interval: replan_interval(),
        })
    }
}

fn resolve_data_dir(flag: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = flag {
        return Ok(dir);
    }
    if let Some(dir) = env::var_os("KIRARA_DATA_DIR").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    dirs::data_dir()
        .map(|dir| dir.join("kirara"))
        .ok_or_else(|| anyhow!("could not determine a data directory; set KIRARA_DATA_DIR"))
}

fn replan_interval() -> Duration {
    let secs = match env::var("KIRARA_REPLAN_INTERVAL_SECS") {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => secs,
            _ => {
                warn!("Ignoring KIRARA_REPLAN_INTERVAL_SECS={raw}; using {DEFAULT_REPLAN_INTERVAL_SECS}");
                DEFAULT_REPLAN_INTERVAL_SECS
            }
        },
        Err(_) => DEFAULT_REPLAN_INTERVAL_SECS,
    };
    Duration::from_secs(secs)
}

async fn run_cli(cli: Cli) -> Result<()> {
    let data_dir = resolve_data_dir(cli.data_dir)?;
    let state = AppState::open(data_dir)?;
    cli::execute(cli.command, &state).await
}

pub fn run() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();
    info!("Kirara starting up...");

    let result = tokio::runtime::Runtime::new()
        .context("failed to start async runtime")
        .and_then(|runtime| runtime.block_on(run_cli(cli)));

    if let Err(err) = result {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
