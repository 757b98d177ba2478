use cdc_event_store::EventLog;

use super::config::Effective;
use super::error::AppError;
use super::open_store;

/// Print every event of the configured account, oldest first.
pub async fn run(eff: &Effective) -> Result<(), AppError> {
    let codec = eff.codec()?;
    let store = open_store(eff).await?;

    let result = store.query_by_account(&eff.account_id).await;
    store.close().await;
    let events = result?;

    for event in &events {
        match codec.decode(event.payload()) {
            Ok(message) => tracing::info!(event_id = %event.id(), "{}: {message}", event.observed_at()),
            Err(e) => tracing::warn!(event_id = %event.id(), error = %e, "{event}"),
        }
    }
    tracing::info!(account_id = %eff.account_id, count = events.len(), "fetched events");
    Ok(())
}
