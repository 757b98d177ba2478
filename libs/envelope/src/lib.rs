//! Polymorphic event envelopes.
//!
//! A payload is stored as a `google.protobuf.Any`: the inner message's
//! type URL next to its serialized bytes. Decoding resolves the URL through
//! a [`TypeRegistry`] filled at startup, so producers can add event kinds
//! without the consumer knowing them at compile time.

mod codec;
mod error;
pub mod messages;
mod registry;

pub use codec::{DecodedMessage, EnvelopeCodec};
pub use error::{DecodeError, EncodeError, RegistryError, Stage};
pub use registry::{DynamicPayload, Payload, TypeRegistry};

/// Authority part of every type URL produced by this crate.
pub const TYPE_URL_PREFIX: &str = "type.googleapis.com/";
