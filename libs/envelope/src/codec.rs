use std::sync::Arc;

use prost::Message;
use prost_types::Any;

use crate::error::{DecodeError, EncodeError, Stage};
use crate::registry::{Payload, TypeRegistry};

// ═══════════════════════════════════════════════════════════════
//  DecodedMessage
// ═══════════════════════════════════════════════════════════════

/// Inner message of an envelope, resolved through the registry.
#[derive(Debug)]
pub struct DecodedMessage {
    type_url: String,
    message: Box<dyn Payload>,
}

impl DecodedMessage {
    pub fn type_url(&self) -> &str {
        &self.type_url
    }

    pub fn message(&self) -> &dyn Payload {
        self.message.as_ref()
    }

    /// Typed access for registered generated messages.
    pub fn downcast_ref<M: 'static>(&self) -> Option<&M> {
        self.message.as_any().downcast_ref::<M>()
    }
}

impl std::fmt::Display for DecodedMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message.describe())
    }
}

// ═══════════════════════════════════════════════════════════════
//  EnvelopeCodec
// ═══════════════════════════════════════════════════════════════

/// Encodes messages into `google.protobuf.Any` envelopes and back.
///
/// Cheap to clone; the registry is shared.
#[derive(Clone, Debug)]
pub struct EnvelopeCodec {
    registry: Arc<TypeRegistry>,
}

impl EnvelopeCodec {
    pub fn new(registry: TypeRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Wrap `message` with its type identity and serialize the envelope.
    ///
    /// Only types the registry can decode are accepted, so every payload
    /// produced here round-trips through [`EnvelopeCodec::decode`].
    pub fn encode(&self, message: &dyn Payload) -> Result<Vec<u8>, EncodeError> {
        let type_url = message.type_url();
        if !is_valid_type_url(&type_url) {
            return Err(EncodeError::InvalidTypeUrl(type_url));
        }
        if !self.registry.contains(&type_url) {
            return Err(EncodeError::Unregistered(type_url));
        }

        let envelope = Any {
            type_url,
            value: message.encode_payload(),
        };
        Ok(envelope.encode_to_vec())
    }

    /// Decode envelope bytes: outer container → type lookup → inner message.
    ///
    /// Never panics on arbitrary input.
    pub fn decode(&self, bytes: &[u8]) -> Result<DecodedMessage, DecodeError> {
        let envelope = Any::decode(bytes).map_err(|source| DecodeError::Malformed {
            stage: Stage::Envelope,
            type_url: None,
            source,
        })?;

        let decode = self
            .registry
            .decoder(&envelope.type_url)
            .ok_or_else(|| DecodeError::UnknownType(envelope.type_url.clone()))?;

        let message = decode(&envelope.value).map_err(|source| DecodeError::Malformed {
            stage: Stage::Message,
            type_url: Some(envelope.type_url.clone()),
            source,
        })?;

        Ok(DecodedMessage {
            type_url: envelope.type_url,
            message,
        })
    }
}

/// `<authority>/<full.type.Name>` with a non-empty name after the last `/`.
fn is_valid_type_url(type_url: &str) -> bool {
    match type_url.rsplit_once('/') {
        Some((_, name)) => !name.is_empty() && !name.starts_with('.') && !name.ends_with('.'),
        None => false,
    }
}
