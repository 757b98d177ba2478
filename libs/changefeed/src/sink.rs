use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use cdc_api::DomainEvent;
use cdc_envelope::DecodedMessage;

/// An event reconstructed from the feed.
#[derive(Debug)]
pub struct ConsumedEvent {
    pub table: String,
    pub key: String,
    pub event: DomainEvent,
    /// Decoded envelope, when payload decoding is enabled.
    pub message: Option<DecodedMessage>,
}

impl std::fmt::Display for ConsumedEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.event.observed_at(), message),
            None => write!(f, "{}", self.event),
        }
    }
}

/// Unit of consumer output.
#[derive(Debug)]
pub enum FeedItem {
    Event(ConsumedEvent),
    Deleted { table: String, key: String },
}

/// Downstream receiver hung up; the consumer stops.
#[derive(Debug, thiserror::Error)]
#[error("event sink closed")]
pub struct SinkClosed;

/// Where the consumer hands events, in feed order.
pub trait EventSink: Send {
    fn deliver(
        &mut self,
        item: FeedItem,
    ) -> Pin<Box<dyn Future<Output = Result<(), SinkClosed>> + Send + '_>>;
}

/// Writes every item to the log.
#[derive(Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn deliver(
        &mut self,
        item: FeedItem,
    ) -> Pin<Box<dyn Future<Output = Result<(), SinkClosed>> + Send + '_>> {
        match item {
            FeedItem::Event(consumed) => tracing::info!(
                table = %consumed.table,
                event_id = %consumed.event.id(),
                account_id = %consumed.event.account_id(),
                "{consumed}"
            ),
            FeedItem::Deleted { table, key } => tracing::info!(%table, %key, "row deleted"),
        }
        Box::pin(async { Ok(()) })
    }
}

/// Forwards items into a bounded channel. Waits when the receiver lags.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<FeedItem>,
}

impl ChannelSink {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<FeedItem>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn deliver(
        &mut self,
        item: FeedItem,
    ) -> Pin<Box<dyn Future<Output = Result<(), SinkClosed>> + Send + '_>> {
        Box::pin(async move { self.tx.send(item).await.map_err(|_| SinkClosed) })
    }
}
