use std::future::Future;
use std::pin::Pin;

use chrono::NaiveDateTime;
use sqlx::postgres::{PgPool, PgPoolOptions};

use cdc_api::DomainEvent;

use crate::{EventLog, StoreError};

#[derive(sqlx::FromRow)]
struct EventRow {
    event_id: String,
    account_id: String,
    payload: Vec<u8>,
    observed_at: NaiveDateTime,
}

impl From<EventRow> for DomainEvent {
    fn from(row: EventRow) -> Self {
        DomainEvent::from_parts(row.event_id, row.account_id, row.payload, row.observed_at)
    }
}

/// `events` table over a CockroachDB/Postgres connection pool.
///
/// Events sharing an `observed_at` come back ordered by `event_id`: the
/// table keeps no insertion sequence.
///
/// Clones share the pool; [`PgEventStore::close`] closes it for all of them.
#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(database_url)
            .await
            .map_err(StoreError::Connect)?;
        Ok(Self { pool })
    }

    /// Apply the embedded migrations. Nothing pending is not an error.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        let mut migrator = sqlx::migrate!("./migrations");
        // CockroachDB has no advisory locks.
        migrator.set_locking(false);
        migrator.run(&self.pool).await?;
        tracing::debug!("migrations applied");
        Ok(())
    }

    /// Close every connection of the pool, waiting for checked-out ones.
    pub async fn close(self) {
        self.pool.close().await;
        tracing::debug!("event store closed");
    }
}

impl EventLog for PgEventStore {
    fn insert<'a>(
        &'a self,
        event: &'a DomainEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            sqlx::query(
                r#"
                INSERT INTO events (event_id, account_id, payload, observed_at)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(event.id())
            .bind(event.account_id())
            .bind(event.payload())
            .bind(event.observed_at())
            .execute(&self.pool)
            .await
            .map_err(StoreError::Write)?;
            Ok(())
        })
    }

    fn query_by_account<'a>(
        &'a self,
        account_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DomainEvent>, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let rows = sqlx::query_as::<_, EventRow>(
                r#"
                SELECT event_id, account_id, payload, observed_at
                FROM events
                WHERE account_id = $1
                ORDER BY observed_at, event_id
                "#,
            )
            .bind(account_id)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Read)?;

            Ok(rows.into_iter().map(DomainEvent::from).collect())
        })
    }

    fn clean(&self) -> Pin<Box<dyn Future<Output = Result<u64, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM events")
                .execute(&self.pool)
                .await
                .map_err(StoreError::Write)?;
            Ok(result.rows_affected())
        })
    }
}
