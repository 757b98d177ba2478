mod error;

use chrono::{NaiveDateTime, SubsecRound, Utc};

pub use error::{Classify, ErrorKind};

// ════════════════════════════════════════════════════════════════
//  Domain event
// ════════════════════════════════════════════════════════════════

/// Каноническая запись журнала событий.
///
/// Создаётся один раз producer'ом, сохраняется один раз и дальше только
/// читается (query, change feed). Поля закрыты: идентификатор и payload
/// не меняются после создания.
///
/// `payload` хранит байты полиморфного envelope; раскодирует их потребитель
/// отдельным шагом.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DomainEvent {
    id: String,
    account_id: String,
    payload: Vec<u8>,
    observed_at: NaiveDateTime,
}

impl DomainEvent {
    /// New event observed now, with a fresh UUIDv4 identifier.
    pub fn new(account_id: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            account_id: account_id.into(),
            payload,
            observed_at: now_micros(),
        }
    }

    /// Rehydrate an event read back from storage or the change feed.
    pub fn from_parts(
        id: impl Into<String>,
        account_id: impl Into<String>,
        payload: Vec<u8>,
        observed_at: NaiveDateTime,
    ) -> Self {
        Self {
            id: id.into(),
            account_id: account_id.into(),
            payload,
            observed_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn observed_at(&self) -> NaiveDateTime {
        self.observed_at
    }
}

impl std::fmt::Display for DomainEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] account={} payload={}B",
            self.observed_at,
            self.id,
            self.account_id,
            self.payload.len()
        )
    }
}

/// Current UTC wall clock truncated to microseconds, the precision of a
/// `TIMESTAMP` column.
pub fn now_micros() -> NaiveDateTime {
    Utc::now().naive_utc().trunc_subsecs(6)
}
