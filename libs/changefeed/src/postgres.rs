use std::future::Future;
use std::pin::Pin;

use sqlx::postgres::{PgConnection, PgRow};
use sqlx::Connection;

use crate::consumer::{FeedConnection, RowStream};
use crate::{ChangefeedError, validate_table};

/// Core (sinkless) changefeed statement for `table`. The name is spliced
/// into the SQL, so it must pass [`validate_table`] first.
pub(crate) fn changefeed_query(table: &str) -> Result<String, ChangefeedError> {
    validate_table(table)?;
    Ok(format!("EXPERIMENTAL CHANGEFEED FOR {table}"))
}

/// Dedicated CockroachDB connection serving one change feed.
///
/// The feed holds the connection for as long as it runs, so it never
/// comes from the shared pool.
pub struct PgFeedConnection {
    conn: PgConnection,
    query: String,
}

impl PgFeedConnection {
    pub async fn connect(database_url: &str) -> Result<Self, ChangefeedError> {
        let conn = PgConnection::connect(database_url)
            .await
            .map_err(ChangefeedError::Connect)?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: PgConnection) -> Self {
        Self {
            conn,
            query: String::new(),
        }
    }
}

impl FeedConnection for PgFeedConnection {
    type Row = PgRow;

    fn open<'a>(&'a mut self, table: &'a str) -> Result<RowStream<'a, PgRow>, ChangefeedError> {
        self.query = changefeed_query(table)?;
        tracing::debug!(query = %self.query, "opening change feed");

        // Simple query protocol: the changefeed statement cannot be prepared.
        let PgFeedConnection { conn, query } = self;
        Ok(sqlx::raw_sql(query).fetch(conn))
    }

    fn close(self) -> Pin<Box<dyn Future<Output = Result<(), sqlx::Error>> + Send>> {
        // A change feed never finishes its query; drop the socket instead of
        // waiting for a graceful terminate.
        Box::pin(self.conn.close_hard())
    }
}
