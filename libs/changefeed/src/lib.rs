//! Change-feed consumer for the `events` table.
//!
//! A dedicated connection streams `(table, key, value)` rows; each row is
//! parsed, its JSON `after` image rebuilt into a [`cdc_api::DomainEvent`],
//! the payload envelope optionally decoded, and the result handed to an
//! [`EventSink`]. Bad rows are logged and skipped.

mod consumer;
mod error;
mod postgres;
mod record;
mod sink;

pub use consumer::{
    ConsumerOptions, ConsumerState, ConsumerStats, FeedConnection, RowStream, StreamConsumer,
    StreamEnd, validate_table,
};
pub use error::{ChangefeedError, RecordError};
pub use postgres::PgFeedConnection;
pub use record::{AfterState, Change, ChangeRecord, RawRow, TIMESTAMP_FORMAT};
pub use sink::{ChannelSink, ConsumedEvent, EventSink, FeedItem, LogSink, SinkClosed};
