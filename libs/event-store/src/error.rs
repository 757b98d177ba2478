use cdc_api::{Classify, ErrorKind};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("connect: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("write: {0}")]
    Write(#[source] sqlx::Error),

    #[error("read: {0}")]
    Read(#[source] sqlx::Error),
}

impl Classify for StoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Connect(_) | StoreError::Migration(_) => ErrorKind::Config,
            StoreError::Write(_) | StoreError::Read(_) => ErrorKind::Transport,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("encode: {0}")]
    Encode(#[from] cdc_envelope::EncodeError),

    #[error("{0}")]
    Store(#[from] StoreError),
}

impl Classify for LoadError {
    fn kind(&self) -> ErrorKind {
        match self {
            LoadError::Encode(e) => e.kind(),
            LoadError::Store(e) => e.kind(),
        }
    }
}
