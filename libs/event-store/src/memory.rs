use std::future::Future;
use std::pin::Pin;

use tokio::sync::RwLock;

use cdc_api::DomainEvent;

use crate::{EventLog, StoreError};

// ═══════════════════════════════════════════════════════════════
//  MemoryEventLog
// ═══════════════════════════════════════════════════════════════

/// In-memory event log. Queries return ascending `observed_at`, ties in
/// insertion order.
#[derive(Default)]
pub struct MemoryEventLog {
    events: RwLock<Vec<DomainEvent>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

impl EventLog for MemoryEventLog {
    fn insert<'a>(
        &'a self,
        event: &'a DomainEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            self.events.write().await.push(event.clone());
            Ok(())
        })
    }

    fn query_by_account<'a>(
        &'a self,
        account_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DomainEvent>, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let events = self.events.read().await;
            let mut result: Vec<DomainEvent> = events
                .iter()
                .filter(|e| e.account_id() == account_id)
                .cloned()
                .collect();
            // stable: equal timestamps keep insertion order
            result.sort_by_key(|e| e.observed_at());
            Ok(result)
        })
    }

    fn clean(&self) -> Pin<Box<dyn Future<Output = Result<u64, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut events = self.events.write().await;
            let removed = events.len() as u64;
            events.clear();
            Ok(removed)
        })
    }
}
