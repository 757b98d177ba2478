//! Runs against a live CockroachDB (or Postgres) database.
//!
//! CDC_TEST_DATABASE_URL=postgres://root@localhost:26257/cdc_test?sslmode=disable \
//!     cargo test -p cdc-event-store -- --ignored

use std::sync::Arc;

use cdc_api::DomainEvent;
use cdc_envelope::messages::AccountOpened;
use cdc_envelope::{EnvelopeCodec, TypeRegistry};
use cdc_event_store::{EventLog, Loader, PgEventStore};

async fn store() -> PgEventStore {
    let url = std::env::var("CDC_TEST_DATABASE_URL").expect("CDC_TEST_DATABASE_URL is not set");
    let store = PgEventStore::connect(&url).await.expect("connect");
    store.migrate().await.expect("migrate");
    // second run must be a no-op
    store.migrate().await.expect("migrate twice");
    store
}

#[tokio::test]
#[ignore = "requires a running database"]
async fn insert_then_query_by_account() {
    let store = store().await;
    let account = uuid::Uuid::new_v4().to_string();
    let codec = EnvelopeCodec::new(TypeRegistry::with_builtin_types());
    let loader = Loader::new(Arc::new(store.clone()), codec.clone(), account.clone());

    for i in 0..100 {
        let msg = AccountOpened {
            account_id: account.clone(),
            display_name: format!("user-{i}"),
        };
        loader.load(&msg).await.expect("load");
    }

    let events = store.query_by_account(&account).await.expect("query");
    assert_eq!(events.len(), 100);
    assert!(events.windows(2).all(|w| w[0].observed_at() <= w[1].observed_at()));
    for event in &events {
        let decoded = codec.decode(event.payload()).expect("decode");
        let opened = decoded.downcast_ref::<AccountOpened>().expect("AccountOpened");
        assert_eq!(opened.account_id, account);
    }

    store.close().await;
}

#[tokio::test]
#[ignore = "requires a running database"]
async fn equal_timestamps_come_back_by_event_id() {
    let store = store().await;
    let account = uuid::Uuid::new_v4().to_string();
    let observed_at = chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
        .and_then(|d| d.and_hms_micro_opt(12, 30, 15, 0))
        .expect("timestamp");

    for suffix in ["c", "a", "b"] {
        let event = DomainEvent::from_parts(format!("{account}-{suffix}"), account.clone(), vec![], observed_at);
        store.insert(&event).await.expect("insert");
    }

    let first: Vec<String> = store
        .query_by_account(&account)
        .await
        .expect("query")
        .iter()
        .map(|e| e.id().to_string())
        .collect();
    let expected: Vec<String> = ["a", "b", "c"].iter().map(|s| format!("{account}-{s}")).collect();
    assert_eq!(first, expected);

    let again: Vec<String> = store
        .query_by_account(&account)
        .await
        .expect("query")
        .iter()
        .map(|e| e.id().to_string())
        .collect();
    assert_eq!(again, first);

    store.close().await;
}
