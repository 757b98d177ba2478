use cdc_api::{Classify, ErrorKind};
use cdc_changefeed::ChangefeedError;
use cdc_envelope::RegistryError;
use cdc_event_store::{LoadError, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Registry(#[from] RegistryError),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Load(#[from] LoadError),

    #[error("{0}")]
    Changefeed(#[from] ChangefeedError),

    #[error("signal: {0}")]
    Signal(#[from] std::io::Error),

    #[error("task: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl Classify for AppError {
    fn kind(&self) -> ErrorKind {
        match self {
            AppError::Config(_) => ErrorKind::Config,
            AppError::Registry(e) => e.kind(),
            AppError::Store(e) => e.kind(),
            AppError::Load(e) => e.kind(),
            AppError::Changefeed(e) => e.kind(),
            AppError::Signal(_) | AppError::Task(_) => ErrorKind::Transport,
        }
    }
}
