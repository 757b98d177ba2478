use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use prost::Message;
use prost_reflect::{DescriptorPool, DynamicMessage, MessageDescriptor, ReflectMessage};

use crate::error::RegistryError;
use crate::messages::{AccountOpened, Empty, FundsDeposited, FundsWithdrawn};
use crate::TYPE_URL_PREFIX;

// ═══════════════════════════════════════════════════════════════
//  Payload — anything that can ride inside an envelope
// ═══════════════════════════════════════════════════════════════

/// A message with a stable type identity.
///
/// Implemented for every generated `prost` message that also implements
/// [`prost::Name`], and for [`DynamicPayload`] (descriptor-driven types).
pub trait Payload: std::fmt::Debug + Send + Sync + 'static {
    /// Globally unique type identifier, e.g.
    /// `type.googleapis.com/cdc.account.v1.AccountOpened`.
    fn type_url(&self) -> String;

    /// Serialized inner bytes.
    fn encode_payload(&self) -> Vec<u8>;

    fn as_any(&self) -> &dyn Any;

    /// Human-readable rendering for logs.
    fn describe(&self) -> String {
        format!("{self:?}")
    }
}

impl<M> Payload for M
where
    M: Message + prost::Name + 'static,
{
    fn type_url(&self) -> String {
        M::type_url()
    }

    fn encode_payload(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Message decoded through a runtime descriptor rather than a generated type.
#[derive(Debug, Clone)]
pub struct DynamicPayload(pub DynamicMessage);

impl Payload for DynamicPayload {
    fn type_url(&self) -> String {
        format!("{TYPE_URL_PREFIX}{}", self.0.descriptor().full_name())
    }

    fn encode_payload(&self) -> Vec<u8> {
        self.0.encode_to_vec()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn describe(&self) -> String {
        match serde_json::to_string(&self.0) {
            Ok(json) => format!("{} {json}", self.0.descriptor().full_name()),
            Err(_) => format!("{:?}", self.0),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  TypeRegistry
// ═══════════════════════════════════════════════════════════════

type DecodeFn = Arc<dyn Fn(&[u8]) -> Result<Box<dyn Payload>, prost::DecodeError> + Send + Sync>;

/// Type URL → decoder table, populated once at startup.
///
/// New payload kinds are added by registering a decoder; nothing is
/// discovered at decode time.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    decoders: HashMap<String, DecodeFn>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `google.protobuf.Empty` plus the `cdc.account.v1` messages.
    pub fn with_builtin_types() -> Self {
        let mut registry = Self::new();
        registry
            .register::<Empty>()
            .register::<AccountOpened>()
            .register::<FundsDeposited>()
            .register::<FundsWithdrawn>();
        registry
    }

    /// Register a generated message type under its [`prost::Name::type_url`].
    /// Replaces any previous decoder for the same URL.
    pub fn register<M>(&mut self) -> &mut Self
    where
        M: Message + prost::Name + Default + 'static,
    {
        let decode: DecodeFn =
            Arc::new(|bytes: &[u8]| M::decode(bytes).map(|m| Box::new(m) as Box<dyn Payload>));
        self.decoders.insert(M::type_url(), decode);
        self
    }

    /// Register a descriptor-driven decoder. A typed registration for the
    /// same URL takes precedence and is left untouched.
    pub fn register_descriptor(&mut self, descriptor: MessageDescriptor) -> &mut Self {
        let type_url = format!("{TYPE_URL_PREFIX}{}", descriptor.full_name());
        let decode: DecodeFn = Arc::new(move |bytes: &[u8]| {
            DynamicMessage::decode(descriptor.clone(), bytes)
                .map(|m| Box::new(DynamicPayload(m)) as Box<dyn Payload>)
        });
        self.decoders.entry(type_url).or_insert(decode);
        self
    }

    /// Register every message of a `FileDescriptorSet`
    /// (`protoc --descriptor_set_out`). Returns the number of message types
    /// found in the set.
    pub fn register_descriptor_set(&mut self, bytes: &[u8]) -> Result<usize, RegistryError> {
        let pool = DescriptorPool::decode(bytes)?;
        let mut count = 0;
        for descriptor in pool.all_messages().filter(|m| !m.is_map_entry()) {
            self.register_descriptor(descriptor);
            count += 1;
        }
        Ok(count)
    }

    pub fn contains(&self, type_url: &str) -> bool {
        self.decoders.contains_key(type_url)
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Registered type URLs, sorted.
    pub fn type_urls(&self) -> Vec<&str> {
        let mut urls: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        urls.sort_unstable();
        urls
    }

    pub(crate) fn decoder(&self, type_url: &str) -> Option<&DecodeFn> {
        self.decoders.get(type_url)
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.type_urls())
            .finish()
    }
}
