use crate::did::{self, DidError, KEY_METHOD};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use vouch_crypto::KeyType;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no resolver registered for DID method '{0}'")]
    UnsupportedMethod(String),

    #[error("malformed identifier: {0}")]
    MalformedIdentifier(#[from] DidError),
}

/// Public key material an identifier resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionResult {
    pub key_type: KeyType,
    #[serde(with = "hex_bytes")]
    pub public_key: Vec<u8>,
}

/// DID methods this crate knows how to resolve.
///
/// New methods are added here together with their strategy in
/// [`DidMethod::resolve`]; there is no runtime plugin registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DidMethod {
    /// `did:key`: the identifier embeds the key, so resolution is offline and total.
    Key,
}

impl DidMethod {
    pub fn tag(self) -> &'static str {
        match self {
            DidMethod::Key => KEY_METHOD,
        }
    }

    fn resolve(self, identifier: &str) -> Result<ResolutionResult, ResolveError> {
        match self {
            DidMethod::Key => {
                let (key_type, public_key) = did::decode(identifier)?;
                Ok(ResolutionResult {
                    key_type,
                    public_key,
                })
            }
        }
    }
}

/// Read-only registry from method tag to resolution strategy.
///
/// Built once and shared; `resolve` takes `&self` and never caches.
#[derive(Debug, Clone)]
pub struct Resolver {
    methods: HashMap<&'static str, DidMethod>,
}

impl Resolver {
    pub fn new(methods: impl IntoIterator<Item = DidMethod>) -> Self {
        Self {
            methods: methods.into_iter().map(|m| (m.tag(), m)).collect(),
        }
    }

    /// Registered method tags, sorted.
    pub fn methods(&self) -> Vec<&'static str> {
        let mut tags: Vec<_> = self.methods.keys().copied().collect();
        tags.sort_unstable();
        tags
    }

    pub fn resolve(&self, identifier: &str) -> Result<ResolutionResult, ResolveError> {
        let (method, _) = did::split(identifier)?;
        let strategy = self
            .methods
            .get(method)
            .ok_or_else(|| ResolveError::UnsupportedMethod(method.to_string()))?;
        strategy.resolve(identifier)
    }
}

impl Default for Resolver {
    /// A resolver with `did:key` registered.
    fn default() -> Self {
        Self::new([DidMethod::Key])
    }
}

mod hex_bytes {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }
}
