use cdc_api::{Classify, ErrorKind};

use crate::ConsumerState;

/// Failure to turn one change-feed row into an event. Local to that row:
/// the consumer logs it and moves on.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("scan column '{column}': {reason}")]
    Scan { column: String, reason: String },

    #[error("json value: {0}")]
    Json(#[from] serde_json::Error),

    #[error("base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("timestamp '{value}': {source}")]
    Timestamp {
        value: String,
        source: chrono::ParseError,
    },

    #[error("envelope: {0}")]
    Envelope(#[from] cdc_envelope::DecodeError),
}

impl RecordError {
    pub(crate) fn scan(column: &str, reason: impl std::fmt::Display) -> Self {
        RecordError::Scan {
            column: column.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Name of the decode stage that failed, for logs.
    pub fn stage(&self) -> &'static str {
        match self {
            RecordError::Scan { .. } => "scan",
            RecordError::Json(_) => "json",
            RecordError::Base64(_) => "base64",
            RecordError::Timestamp { .. } => "timestamp",
            RecordError::Envelope(_) => "envelope",
        }
    }
}

impl Classify for RecordError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Decode
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChangefeedError {
    #[error("connect: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("invalid table name '{0}'")]
    InvalidTable(String),

    #[error("consumer is not idle ({0:?})")]
    NotIdle(ConsumerState),

    #[error("transport: {0}")]
    Transport(#[from] sqlx::Error),
}

impl Classify for ChangefeedError {
    fn kind(&self) -> ErrorKind {
        match self {
            ChangefeedError::Connect(_)
            | ChangefeedError::InvalidTable(_)
            | ChangefeedError::NotIdle(_) => ErrorKind::Config,
            ChangefeedError::Transport(_) => ErrorKind::Transport,
        }
    }
}
