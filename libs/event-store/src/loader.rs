use std::sync::Arc;

use cdc_api::DomainEvent;
use cdc_envelope::{EnvelopeCodec, Payload};

use crate::{EventLog, LoadError};

/// Producer side: wraps messages into envelopes and appends them to the
/// log for one account.
pub struct Loader {
    log: Arc<dyn EventLog>,
    codec: EnvelopeCodec,
    account_id: String,
}

impl Loader {
    pub fn new(log: Arc<dyn EventLog>, codec: EnvelopeCodec, account_id: impl Into<String>) -> Self {
        Self {
            log,
            codec,
            account_id: account_id.into(),
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Encode `message`, stamp it as a new event and insert it. No retries.
    pub async fn load(&self, message: &dyn Payload) -> Result<DomainEvent, LoadError> {
        let payload = self.codec.encode(message)?;
        let event = DomainEvent::new(self.account_id.clone(), payload);
        self.log.insert(&event).await?;
        tracing::trace!(event_id = %event.id(), type_url = %message.type_url(), "event loaded");
        Ok(event)
    }
}
