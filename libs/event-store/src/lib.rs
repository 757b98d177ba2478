//! Durable event log access: insert, query by account, clean.

mod error;
mod loader;
mod memory;
mod postgres;

use std::future::Future;
use std::pin::Pin;

use cdc_api::DomainEvent;

pub use error::{LoadError, StoreError};
pub use loader::Loader;
pub use memory::MemoryEventLog;
pub use postgres::PgEventStore;

/// Append-only log of [`DomainEvent`]s.
///
/// Neither method retries; retry policy belongs to the caller.
pub trait EventLog: Send + Sync {
    /// Append one event.
    fn insert<'a>(
        &'a self,
        event: &'a DomainEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;

    /// All events of an account, ascending by `observed_at`. Tie order is
    /// up to the implementation but stable across calls.
    fn query_by_account<'a>(
        &'a self,
        account_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DomainEvent>, StoreError>> + Send + 'a>>;

    /// Delete every event. Returns the number of removed rows.
    fn clean(&self) -> Pin<Box<dyn Future<Output = Result<u64, StoreError>> + Send + '_>>;
}
