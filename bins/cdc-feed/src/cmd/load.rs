use std::sync::Arc;

use cdc_envelope::Payload;
use cdc_envelope::messages::{AccountOpened, FundsDeposited, FundsWithdrawn};
use cdc_event_store::Loader;

use super::config::Effective;
use super::error::AppError;
use super::group::TaskGroup;
use super::open_store;

/// Write `load_count` events for the configured account.
pub async fn run(eff: &Effective) -> Result<(), AppError> {
    let codec = eff.codec()?;
    let store = open_store(eff).await?;

    let mut group = TaskGroup::<AppError>::new();

    let token = group.token();
    group.spawn(async move {
        tokio::select! {
            _ = token.cancelled() => Ok(()),
            signal = tokio::signal::ctrl_c() => {
                signal?;
                tracing::info!("interrupted, stopping load");
                token.cancel();
                Ok(())
            }
        }
    });

    let loader = Loader::new(Arc::new(store.clone()), codec, eff.account_id.clone());
    let count = eff.load_count;
    let token = group.token();
    group.spawn(async move {
        let _done = token.clone().drop_guard();
        tracing::info!(account_id = %loader.account_id(), count, "starting to load events");

        let mut loaded: u64 = 0;
        for seq in 0..count {
            if token.is_cancelled() {
                break;
            }
            let message = sample_message(loader.account_id(), seq);
            loader.load(message.as_ref()).await?;
            loaded += 1;
        }

        tracing::info!(loaded, "loaded events");
        Ok(())
    });

    let result = group.wait().await;
    store.close().await;
    result
}

/// Account story: opened first, then alternating deposits and withdrawals.
fn sample_message(account_id: &str, seq: u64) -> Box<dyn Payload> {
    if seq == 0 {
        return Box::new(AccountOpened {
            account_id: account_id.into(),
            display_name: format!("account {account_id}"),
        });
    }
    let amount_minor = (seq as i64) * 100;
    if seq % 2 == 1 {
        Box::new(FundsDeposited {
            account_id: account_id.into(),
            amount_minor,
            currency: "EUR".into(),
        })
    } else {
        Box::new(FundsWithdrawn {
            account_id: account_id.into(),
            amount_minor: amount_minor / 2,
            currency: "EUR".into(),
        })
    }
}
