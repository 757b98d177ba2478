use cdc_api::{Classify, ErrorKind};

/// Which layer of the envelope failed to deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// The outer `google.protobuf.Any` container.
    Envelope,
    /// The inner message bytes of a resolved type.
    Message,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Envelope => f.write_str("envelope"),
            Stage::Message => f.write_str("message"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("invalid type url '{0}'")]
    InvalidTypeUrl(String),

    #[error("type '{0}' is not registered")]
    Unregistered(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed {stage}{}: {source}", type_suffix(.type_url))]
    Malformed {
        stage: Stage,
        type_url: Option<String>,
        source: prost::DecodeError,
    },

    #[error("unknown type '{0}'")]
    UnknownType(String),
}

fn type_suffix(type_url: &Option<String>) -> String {
    type_url.as_deref().map(|t| format!(" ({t})")).unwrap_or_default()
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("descriptor set: {0}")]
    Descriptor(#[from] prost_reflect::DescriptorError),
}

impl Classify for EncodeError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Decode
    }
}

impl Classify for DecodeError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Decode
    }
}

impl Classify for RegistryError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Config
    }
}
