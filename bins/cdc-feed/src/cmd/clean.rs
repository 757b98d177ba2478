use cdc_event_store::EventLog;

use super::config::Effective;
use super::error::AppError;
use super::open_store;

/// Delete every event.
pub async fn run(eff: &Effective) -> Result<(), AppError> {
    let store = open_store(eff).await?;
    let result = store.clean().await;
    store.close().await;

    let removed = result?;
    tracing::info!(removed, "events table cleaned");
    Ok(())
}
