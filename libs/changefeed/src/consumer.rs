use std::future::Future;
use std::pin::Pin;

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use cdc_envelope::EnvelopeCodec;

use crate::record::{Change, ChangeRecord, RawRow};
use crate::sink::{ConsumedEvent, EventSink, FeedItem};
use crate::{ChangefeedError, RecordError};

/// Rows of an open change feed. Ends only when the server closes the feed.
pub type RowStream<'a, R> = Pin<Box<dyn Stream<Item = Result<R, sqlx::Error>> + Send + 'a>>;

/// A dedicated connection able to stream one table's change feed.
pub trait FeedConnection: Send {
    type Row: RawRow + Send;

    /// Start the change feed for `table` and stream its rows. Fails before
    /// any I/O when `table` is not a valid identifier.
    fn open<'a>(&'a mut self, table: &'a str) -> Result<RowStream<'a, Self::Row>, ChangefeedError>;

    /// Release the connection.
    fn close(self) -> Pin<Box<dyn Future<Output = Result<(), sqlx::Error>> + Send>>;
}

// ═══════════════════════════════════════════════════════════════
//  State & options
// ═══════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsumerState {
    Idle,
    Streaming,
    /// Stopped on cancellation, end of stream or a closed sink.
    Closed,
    /// Stopped on an error.
    Failed,
}

/// Why a run ended without a transport error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamEnd {
    Cancelled,
    Exhausted,
    SinkClosed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Rows read from the feed.
    pub received: u64,
    /// Events handed to the sink.
    pub delivered: u64,
    /// Deletions handed to the sink.
    pub deleted: u64,
    /// Rows dropped on a decode error.
    pub skipped: u64,
}

#[derive(Clone, Debug)]
pub struct ConsumerOptions {
    /// Watched table, plain or schema-qualified identifier.
    pub table: String,
    /// Log a progress line every N received rows; 0 turns it off.
    pub progress_every: u64,
    /// Decode each payload envelope before delivery. A payload that fails
    /// to decode skips the row.
    pub decode_payloads: bool,
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self {
            table: "events".into(),
            progress_every: 10,
            decode_payloads: true,
        }
    }
}

/// Accepts `name` or `schema.name`, each part `[A-Za-z_][A-Za-z0-9_]*`.
pub fn validate_table(table: &str) -> Result<(), ChangefeedError> {
    let ident = |part: &str| {
        let mut chars = part.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    };
    let parts: Vec<&str> = table.split('.').collect();
    if parts.len() <= 2 && parts.iter().all(|p| ident(p)) {
        Ok(())
    } else {
        Err(ChangefeedError::InvalidTable(table.to_string()))
    }
}

// ═══════════════════════════════════════════════════════════════
//  Consumer
// ═══════════════════════════════════════════════════════════════

struct Skipped {
    raw: Option<String>,
    error: RecordError,
}

/// Reads a change feed row by row, rebuilds each [`cdc_api::DomainEvent`]
/// and hands it to the sink. Rows that fail to decode are logged and
/// skipped; transport errors end the run.
pub struct StreamConsumer<S> {
    options: ConsumerOptions,
    codec: EnvelopeCodec,
    sink: S,
    state: ConsumerState,
    stats: ConsumerStats,
}

impl<S: EventSink> StreamConsumer<S> {
    pub fn new(
        options: ConsumerOptions,
        codec: EnvelopeCodec,
        sink: S,
    ) -> Result<Self, ChangefeedError> {
        validate_table(&options.table)?;
        Ok(Self {
            options,
            codec,
            sink,
            state: ConsumerState::Idle,
            stats: ConsumerStats::default(),
        })
    }

    pub fn state(&self) -> ConsumerState {
        self.state
    }

    pub fn stats(&self) -> ConsumerStats {
        self.stats
    }

    /// Stream until cancelled, the feed ends, the sink closes or the
    /// transport fails. `conn` is closed exactly once, after the feed
    /// cursor has been dropped, whatever the outcome.
    pub async fn run<C: FeedConnection>(
        &mut self,
        mut conn: C,
        token: CancellationToken,
    ) -> Result<StreamEnd, ChangefeedError> {
        if self.state != ConsumerState::Idle {
            release(conn).await;
            return Err(ChangefeedError::NotIdle(self.state));
        }

        self.state = ConsumerState::Streaming;
        tracing::info!(table = %self.options.table, "change feed started");

        let result = self.pump(&mut conn, &token).await;
        release(conn).await;

        match &result {
            Ok(end) => {
                self.state = ConsumerState::Closed;
                tracing::info!(
                    table = %self.options.table,
                    end = ?end,
                    received = self.stats.received,
                    delivered = self.stats.delivered,
                    skipped = self.stats.skipped,
                    "change feed stopped"
                );
            }
            Err(e) => {
                self.state = ConsumerState::Failed;
                tracing::error!(table = %self.options.table, error = %e, "change feed failed");
            }
        }
        result
    }

    async fn pump<C: FeedConnection>(
        &mut self,
        conn: &mut C,
        token: &CancellationToken,
    ) -> Result<StreamEnd, ChangefeedError> {
        let table = self.options.table.clone();
        let mut rows = conn.open(&table)?;

        loop {
            let row = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(StreamEnd::Cancelled),
                row = rows.next() => row,
            };
            let row = match row {
                Some(Ok(row)) => row,
                Some(Err(e)) => return Err(ChangefeedError::Transport(e)),
                None => return Ok(StreamEnd::Exhausted),
            };
            self.stats.received += 1;

            match self.decode_row(&row) {
                Ok(item) => {
                    let deletion = matches!(item, FeedItem::Deleted { .. });
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => return Ok(StreamEnd::Cancelled),
                        sent = self.sink.deliver(item) => {
                            if sent.is_err() {
                                return Ok(StreamEnd::SinkClosed);
                            }
                        }
                    }
                    if deletion {
                        self.stats.deleted += 1;
                    } else {
                        self.stats.delivered += 1;
                    }
                }
                Err(Skipped { raw, error }) => {
                    self.stats.skipped += 1;
                    tracing::warn!(
                        %table,
                        stage = error.stage(),
                        raw = raw.as_deref().unwrap_or("<unreadable>"),
                        error = %error,
                        "bad record, skipping"
                    );
                }
            }

            if progress_due(self.stats.received, self.options.progress_every) {
                tracing::info!(
                    %table,
                    received = self.stats.received,
                    delivered = self.stats.delivered,
                    deleted = self.stats.deleted,
                    skipped = self.stats.skipped,
                    "change feed progress"
                );
            }
        }
    }

    fn decode_row<R: RawRow>(&self, row: &R) -> Result<FeedItem, Skipped> {
        let record = ChangeRecord::parse(row).map_err(|error| Skipped { raw: None, error })?;
        self.interpret(&record).map_err(|error| Skipped {
            raw: Some(record.value.clone()),
            error,
        })
    }

    fn interpret(&self, record: &ChangeRecord) -> Result<FeedItem, RecordError> {
        let after = match record.extract_after_state()? {
            Change::Upsert(after) => after,
            Change::Deleted { key } => {
                return Ok(FeedItem::Deleted {
                    table: record.table.clone(),
                    key,
                });
            }
        };
        let event = after.to_domain_event()?;
        let message = if self.options.decode_payloads {
            Some(self.codec.decode(event.payload())?)
        } else {
            None
        };
        Ok(FeedItem::Event(ConsumedEvent {
            table: record.table.clone(),
            key: record.key.clone(),
            event,
            message,
        }))
    }
}

/// Every `every`-th received row; `0` turns progress lines off.
fn progress_due(received: u64, every: u64) -> bool {
    every > 0 && received % every == 0
}

async fn release<C: FeedConnection>(conn: C) {
    if let Err(e) = conn.close().await {
        tracing::warn!(error = %e, "change feed connection close error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use cdc_api::DomainEvent;
    use cdc_envelope::TypeRegistry;
    use cdc_envelope::messages::{AccountOpened, FundsDeposited};

    use crate::sink::ChannelSink;
    use crate::test_support::{FakeFeed, MapRow, feed_row};

    const ACCOUNT: &str = "979e1cb9-5b2c-415d-9bed-58df67352e82";

    fn codec() -> EnvelopeCodec {
        EnvelopeCodec::new(TypeRegistry::with_builtin_types())
    }

    fn deposit(amount: i64) -> DomainEvent {
        let msg = FundsDeposited {
            account_id: ACCOUNT.into(),
            amount_minor: amount,
            currency: "EUR".into(),
        };
        DomainEvent::new(ACCOUNT, codec().encode(&msg).unwrap())
    }

    fn consumer(options: ConsumerOptions) -> (StreamConsumer<ChannelSink>, tokio::sync::mpsc::Receiver<FeedItem>) {
        let (sink, rx) = ChannelSink::new(64);
        (StreamConsumer::new(options, codec(), sink).unwrap(), rx)
    }

    fn drain(rx: &mut tokio::sync::mpsc::Receiver<FeedItem>) -> Vec<FeedItem> {
        let mut items = Vec::new();
        while let Ok(item) = rx.try_recv() {
            items.push(item);
        }
        items
    }

    #[tokio::test]
    async fn one_insert_yields_one_event() {
        let opened = AccountOpened {
            account_id: ACCOUNT.into(),
            display_name: "Alice".into(),
        };
        let stored = DomainEvent::new(ACCOUNT, codec().encode(&opened).unwrap());
        let feed = FakeFeed::new(vec![Ok(feed_row(&stored))]);
        let closes = feed.closes.clone();

        let (mut consumer, mut rx) = consumer(ConsumerOptions::default());
        let end = consumer.run(feed, CancellationToken::new()).await.unwrap();

        assert_eq!(end, StreamEnd::Exhausted);
        assert_eq!(consumer.state(), ConsumerState::Closed);
        assert_eq!(closes.load(Ordering::SeqCst), 1);

        let items = drain(&mut rx);
        assert_eq!(items.len(), 1);
        let FeedItem::Event(consumed) = &items[0] else {
            panic!("expected event");
        };
        assert_eq!(consumed.event, stored);
        let message = consumed.message.as_ref().unwrap();
        assert_eq!(message.downcast_ref::<AccountOpened>(), Some(&opened));
    }

    #[tokio::test]
    async fn bad_row_is_skipped_and_stream_continues() {
        let mut rows: Vec<_> = (0..10).map(|i| Ok(feed_row(&deposit(i)))).collect();
        rows[4] = Ok(MapRow::new(&[
            ("table", "events"),
            ("key", "[\"bad\"]"),
            (
                "value",
                r#"{"after":{"event_id":"bad","account_id":"a","payload":"%%%","observed_at":"2024-03-01T12:30:15"}}"#,
            ),
        ]));
        let feed = FakeFeed::new(rows);

        let (mut consumer, mut rx) = consumer(ConsumerOptions::default());
        consumer.run(feed, CancellationToken::new()).await.unwrap();

        let stats = consumer.stats();
        assert_eq!(stats.received, 10);
        assert_eq!(stats.delivered, 9);
        assert_eq!(stats.skipped, 1);

        let amounts: Vec<i64> = drain(&mut rx)
            .iter()
            .map(|item| match item {
                FeedItem::Event(c) => {
                    c.message.as_ref().unwrap().downcast_ref::<FundsDeposited>().unwrap().amount_minor
                }
                FeedItem::Deleted { .. } => panic!("unexpected deletion"),
            })
            .collect();
        assert_eq!(amounts, vec![0, 1, 2, 3, 5, 6, 7, 8, 9]);
    }

    #[tokio::test]
    async fn deletion_is_forwarded_not_dropped() {
        let feed = FakeFeed::new(vec![
            Ok(feed_row(&deposit(1))),
            Ok(MapRow::new(&[("table", "events"), ("key", "[\"e-1\"]"), ("value", r#"{"after":null}"#)])),
        ]);

        let (mut consumer, mut rx) = consumer(ConsumerOptions::default());
        consumer.run(feed, CancellationToken::new()).await.unwrap();

        assert_eq!(consumer.stats().deleted, 1);
        let items = drain(&mut rx);
        assert!(matches!(
            &items[1],
            FeedItem::Deleted { table, key } if table == "events" && key == "[\"e-1\"]"
        ));
    }

    #[tokio::test]
    async fn undecodable_envelope_depends_on_decode_flag() {
        let junk = DomainEvent::new(ACCOUNT, vec![0xff, 0xff, 0xff]);

        let (mut strict, mut rx) = consumer(ConsumerOptions::default());
        strict.run(FakeFeed::new(vec![Ok(feed_row(&junk))]), CancellationToken::new()).await.unwrap();
        assert_eq!(strict.stats().skipped, 1);
        assert!(drain(&mut rx).is_empty());

        let (mut raw, mut rx) = consumer(ConsumerOptions {
            decode_payloads: false,
            ..ConsumerOptions::default()
        });
        raw.run(FakeFeed::new(vec![Ok(feed_row(&junk))]), CancellationToken::new()).await.unwrap();
        let items = drain(&mut rx);
        assert!(matches!(&items[..], [FeedItem::Event(c)] if c.message.is_none() && c.event == junk));
    }

    #[tokio::test]
    async fn cancel_while_waiting_closes_connection_once() {
        let feed = FakeFeed::new(vec![Ok(feed_row(&deposit(1)))]).hanging();
        let closes = feed.closes.clone();
        let closed_while_open = feed.closed_while_open.clone();

        let (consumer, _rx) = consumer(ConsumerOptions::default());
        let token = CancellationToken::new();
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            let mut consumer = consumer;
            let end = consumer.run(feed, task_token).await;
            (consumer, end)
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();

        let (consumer, end) = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("consumer did not stop")
            .unwrap();

        assert_eq!(end.unwrap(), StreamEnd::Cancelled);
        assert_eq!(consumer.state(), ConsumerState::Closed);
        assert_eq!(consumer.stats().delivered, 1);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(closed_while_open.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn transport_error_fails_the_run() {
        let feed = FakeFeed::new(vec![
            Ok(feed_row(&deposit(1))),
            Err(sqlx::Error::Protocol("connection reset".into())),
            Ok(feed_row(&deposit(2))),
        ]);
        let closes = feed.closes.clone();

        let (mut consumer, _rx) = consumer(ConsumerOptions::default());
        let err = consumer.run(feed, CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, ChangefeedError::Transport(_)));
        assert_eq!(consumer.state(), ConsumerState::Failed);
        assert_eq!(consumer.stats().delivered, 1);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn closed_sink_stops_the_run() {
        let feed = FakeFeed::new(vec![Ok(feed_row(&deposit(1))), Ok(feed_row(&deposit(2)))]).hanging();
        let closes = feed.closes.clone();

        let (mut consumer, rx) = consumer(ConsumerOptions::default());
        drop(rx);
        let end = consumer.run(feed, CancellationToken::new()).await.unwrap();

        assert_eq!(end, StreamEnd::SinkClosed);
        assert_eq!(consumer.stats().delivered, 0);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_run_is_rejected_but_connection_released() {
        let (mut consumer, _rx) = consumer(ConsumerOptions::default());
        consumer.run(FakeFeed::new(vec![]), CancellationToken::new()).await.unwrap();

        let again = FakeFeed::new(vec![]);
        let closes = again.closes.clone();
        let err = consumer.run(again, CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, ChangefeedError::NotIdle(ConsumerState::Closed)));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn table_names() {
        for ok in ["events", "public.events", "_t1", "Events_2024"] {
            assert!(validate_table(ok).is_ok(), "{ok}");
        }
        for bad in ["", "1events", "events;", "a.b.c", "ev ents", "events--", "\"events\"", "public."] {
            assert!(validate_table(bad).is_err(), "{bad}");
        }

        let (sink, _rx) = ChannelSink::new(1);
        let options = ConsumerOptions {
            table: "events; DROP TABLE events".into(),
            ..ConsumerOptions::default()
        };
        assert!(matches!(
            StreamConsumer::new(options, codec(), sink),
            Err(ChangefeedError::InvalidTable(_))
        ));
    }

    #[test]
    fn progress_cadence() {
        let due = |every| (1..=10).filter(|&n| progress_due(n, every)).collect::<Vec<u64>>();
        assert_eq!(due(0), Vec::<u64>::new());
        assert_eq!(due(1), (1..=10).collect::<Vec<_>>());
        assert_eq!(due(3), vec![3, 6, 9]);
        assert_eq!(due(10), vec![10]);
        assert_eq!(due(11), Vec::<u64>::new());
    }

    #[tokio::test]
    async fn progress_setting_does_not_change_outcome() {
        let rows = || -> Vec<Result<MapRow, sqlx::Error>> {
            vec![
                Ok(feed_row(&deposit(1))),
                Ok(MapRow::new(&[("table", "events"), ("key", "[\"x\"]"), ("value", "not json")])),
                Ok(feed_row(&deposit(2))),
                Ok(MapRow::new(&[("table", "events"), ("key", "[\"e-1\"]"), ("value", r#"{"after":null}"#)])),
                Ok(feed_row(&deposit(3))),
            ]
        };

        let mut outcomes = Vec::new();
        for every in [0, 1, 2, 10] {
            let (mut consumer, mut rx) = consumer(ConsumerOptions {
                progress_every: every,
                ..ConsumerOptions::default()
            });
            let end = consumer.run(FakeFeed::new(rows()), CancellationToken::new()).await.unwrap();
            assert_eq!(end, StreamEnd::Exhausted, "progress_every {every}");
            outcomes.push((consumer.stats(), drain(&mut rx).len()));
        }

        let expected = ConsumerStats {
            received: 5,
            delivered: 3,
            deleted: 1,
            skipped: 1,
        };
        for outcome in outcomes {
            assert_eq!(outcome, (expected, 4));
        }
    }

    #[test]
    fn fake_feed_rejects_invalid_table_before_streaming() {
        let mut feed = FakeFeed::new(vec![Ok(feed_row(&deposit(1)))]);
        assert!(matches!(feed.open("events;"), Err(ChangefeedError::InvalidTable(_))));
        assert!(feed.open("events").is_ok());
    }

    #[test]
    fn fresh_consumer_is_idle() {
        let (consumer, _rx) = consumer(ConsumerOptions::default());
        assert_eq!(consumer.state(), ConsumerState::Idle);
        assert_eq!(consumer.stats(), ConsumerStats::default());
    }
}
