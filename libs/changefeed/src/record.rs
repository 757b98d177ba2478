use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::NaiveDateTime;
use serde::Deserialize;
use sqlx::Row;
use sqlx::postgres::PgRow;

use cdc_api::DomainEvent;

use crate::RecordError;

/// Text layout of `observed_at` inside the change-feed JSON. The fraction
/// is optional and carries up to nine digits.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

// ═══════════════════════════════════════════════════════════════
//  Raw rows
// ═══════════════════════════════════════════════════════════════

/// A row produced by the change feed, read column by column as text.
pub trait RawRow {
    fn text(&self, column: &str) -> Result<String, RecordError>;
}

impl RawRow for PgRow {
    fn text(&self, column: &str) -> Result<String, RecordError> {
        // CockroachDB emits key/value as BYTES, Postgres views may use TEXT.
        match self.try_get::<String, _>(column) {
            Ok(text) => Ok(text),
            Err(sqlx::Error::ColumnDecode { .. }) => {
                let bytes: Vec<u8> = self
                    .try_get(column)
                    .map_err(|e| RecordError::scan(column, e))?;
                String::from_utf8(bytes).map_err(|e| RecordError::scan(column, e))
            }
            Err(e) => Err(RecordError::scan(column, e)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Change record
// ═══════════════════════════════════════════════════════════════

/// One change-feed emission. `value` is the JSON text of the change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeRecord {
    pub table: String,
    pub key: String,
    pub value: String,
}

/// Row image of an `events` row after the change, as the feed prints it.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AfterState {
    pub event_id: String,
    pub account_id: String,
    /// Base64 (standard alphabet) of the stored payload bytes.
    pub payload: String,
    /// [`TIMESTAMP_FORMAT`] text.
    pub observed_at: String,
}

/// What a change record means for the consumer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Change {
    /// Insert or update; carries the new row image.
    Upsert(AfterState),
    /// The row under `key` was deleted.
    Deleted { key: String },
}

#[derive(Deserialize)]
struct ChangeValue {
    after: Option<AfterState>,
}

impl ChangeRecord {
    /// Read the `table`, `key` and `value` columns of a feed row.
    pub fn parse<R: RawRow + ?Sized>(row: &R) -> Result<Self, RecordError> {
        Ok(Self {
            table: row.text("table")?,
            key: row.text("key")?,
            value: row.text("value")?,
        })
    }

    /// Decode the JSON value. A missing or null `after` is a deletion.
    pub fn extract_after_state(&self) -> Result<Change, RecordError> {
        let value: ChangeValue = serde_json::from_str(&self.value)?;
        Ok(match value.after {
            Some(after) => Change::Upsert(after),
            None => Change::Deleted {
                key: self.key.clone(),
            },
        })
    }
}

impl AfterState {
    pub fn decode_payload(&self) -> Result<Vec<u8>, RecordError> {
        Ok(STANDARD.decode(&self.payload)?)
    }

    pub fn parse_observed_at(&self) -> Result<NaiveDateTime, RecordError> {
        NaiveDateTime::parse_from_str(&self.observed_at, TIMESTAMP_FORMAT).map_err(|source| {
            RecordError::Timestamp {
                value: self.observed_at.clone(),
                source,
            }
        })
    }

    /// Rebuild the stored event: base64 payload decoded, timestamp parsed.
    pub fn to_domain_event(&self) -> Result<DomainEvent, RecordError> {
        let payload = self.decode_payload()?;
        let observed_at = self.parse_observed_at()?;
        Ok(DomainEvent::from_parts(
            self.event_id.clone(),
            self.account_id.clone(),
            payload,
            observed_at,
        ))
    }
}
