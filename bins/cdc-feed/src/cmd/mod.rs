pub mod changefeed;
pub mod clean;
pub mod config;
pub mod error;
pub mod get;
pub mod group;
pub mod load;

use cdc_event_store::PgEventStore;

use config::Effective;
use error::AppError;

/// Операция, выбранная через `--mode`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Load,
    Changefeed,
    Get,
    Clean,
}

impl Mode {
    pub const USAGE: &'static str = "--mode {load, changefeed, get, clean}";

    /// Exact, case-sensitive match. `None` for a missing or unknown mode.
    pub fn parse(value: Option<&str>) -> Option<Self> {
        match value? {
            "load" => Some(Mode::Load),
            "changefeed" => Some(Mode::Changefeed),
            "get" => Some(Mode::Get),
            "clean" => Some(Mode::Clean),
            _ => None,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Mode::Load => "load",
            Mode::Changefeed => "changefeed",
            Mode::Get => "get",
            Mode::Clean => "clean",
        })
    }
}

pub async fn run(mode: Mode, eff: &Effective) -> Result<(), AppError> {
    match mode {
        Mode::Load => load::run(eff).await,
        Mode::Changefeed => changefeed::run(eff).await,
        Mode::Get => get::run(eff).await,
        Mode::Clean => clean::run(eff).await,
    }
}

/// Connect the shared pool and bring the schema up to date.
pub(crate) async fn open_store(eff: &Effective) -> Result<PgEventStore, AppError> {
    let store = PgEventStore::connect(&eff.database_url).await?;
    if let Err(e) = store.migrate().await {
        store.close().await;
        return Err(e.into());
    }
    tracing::info!("event store ready");
    Ok(store)
}
