use cdc_changefeed::{LogSink, PgFeedConnection, StreamConsumer};

use super::config::Effective;
use super::error::AppError;
use super::group::TaskGroup;
use super::open_store;

/// Follow the change feed of the configured table until Ctrl+C.
pub async fn run(eff: &Effective) -> Result<(), AppError> {
    let codec = eff.codec()?;

    // The feed reads a table that must exist; migrate through the pool first.
    open_store(eff).await?.close().await;

    let mut consumer = StreamConsumer::new(eff.consumer_options(), codec, LogSink)?;
    let conn = PgFeedConnection::connect(&eff.database_url).await?;

    let mut group = TaskGroup::<AppError>::new();

    let token = group.token();
    group.spawn(async move {
        tokio::select! {
            _ = token.cancelled() => Ok(()),
            signal = tokio::signal::ctrl_c() => {
                signal?;
                tracing::info!("interrupted, stopping change feed");
                token.cancel();
                Ok(())
            }
        }
    });

    let token = group.token();
    group.spawn(async move {
        let _done = token.clone().drop_guard();
        tracing::info!("starting changefeed");
        let end = consumer.run(conn, token).await?;
        tracing::info!(?end, stats = ?consumer.stats(), "stopped changefeed");
        Ok(())
    });

    group.wait().await
}
