use multibase::Base;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use vouch_crypto::{KeyType, KeyTypeError};

pub const DID_SCHEME: &str = "did";
/// Method tag of the self-certifying key method.
pub const KEY_METHOD: &str = "key";

/// Error type for DID operations. Every variant means the identifier is malformed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DidError {
    #[error("malformed DID string: expected 'did:<method>:<method-specific-id>'")]
    Malformed,

    #[error("unsupported DID method '{0}'")]
    UnsupportedMethod(String),

    #[error("method-specific identifier is not multibase base58btc: {0}")]
    InvalidEncoding(String),

    #[error("decoded key material is invalid: {0}")]
    InvalidKey(#[from] KeyTypeError),

    #[error("identifier is not in canonical form")]
    NonCanonical,
}

/// Split `did:<method>:<method-specific-id>` into method and method-specific id.
pub fn split(identifier: &str) -> Result<(&str, &str), DidError> {
    let mut parts = identifier.splitn(3, ':');
    let (Some(scheme), Some(method), Some(msid)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(DidError::Malformed);
    };
    if scheme != DID_SCHEME
        || method.is_empty()
        || !method
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        || msid.is_empty()
    {
        return Err(DidError::Malformed);
    }
    Ok((method, msid))
}

/// Encode raw public key bytes as a `did:key` identifier.
///
/// Follows the DID Key Method: `did:key:` + multibase(base58btc, multicodec ‖ key).
pub fn encode(key_type: KeyType, public_key: &[u8]) -> String {
    let prefix = key_type.multicodec_prefix();
    let mut tagged = Vec::with_capacity(prefix.len() + public_key.len());
    tagged.extend_from_slice(&prefix);
    tagged.extend_from_slice(public_key);

    format!(
        "{}:{}:{}",
        DID_SCHEME,
        KEY_METHOD,
        multibase::encode(Base::Base58Btc, tagged)
    )
}

/// Decode a `did:key` identifier into its key type and raw public key bytes.
pub fn decode(identifier: &str) -> Result<(KeyType, Vec<u8>), DidError> {
    let (method, msid) = split(identifier)?;
    if method != KEY_METHOD {
        return Err(DidError::UnsupportedMethod(method.to_string()));
    }

    let (base, tagged) =
        multibase::decode(msid).map_err(|e| DidError::InvalidEncoding(e.to_string()))?;
    if base != Base::Base58Btc {
        return Err(DidError::InvalidEncoding(format!(
            "expected base58btc ('z'), found {:?}",
            base
        )));
    }

    let key_type = KeyType::from_multicodec(&tagged)?;
    let public_key = tagged[key_type.multicodec_prefix().len()..].to_vec();
    key_type.validate_public_key(&public_key)?;

    // Encoding must reproduce the input exactly.
    if encode(key_type, &public_key) != identifier {
        return Err(DidError::NonCanonical);
    }
    Ok((key_type, public_key))
}

/// A validated `did:key` identifier.
///
/// Construction always decodes the key, so a `Did` value is known to carry a
/// supported key type and well-formed key bytes.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Did {
    id: String,
    key_type: KeyType,
    public_key: Vec<u8>,
}

impl Did {
    /// Construct a DID from raw public key bytes, validating them first.
    pub fn from_public_key(key_type: KeyType, public_key: &[u8]) -> Result<Self, DidError> {
        key_type.validate_public_key(public_key)?;
        Ok(Self {
            id: encode(key_type, public_key),
            key_type,
            public_key: public_key.to_vec(),
        })
    }

    /// Construct a DID from a secp256k1 verifying key (compressed form).
    pub fn new_secp256k1(pk: &k256::ecdsa::VerifyingKey) -> Self {
        let public_key = pk.to_encoded_point(true).as_bytes().to_vec();
        Self {
            id: encode(KeyType::Secp256k1, &public_key),
            key_type: KeyType::Secp256k1,
            public_key,
        }
    }

    /// Construct a DID from an Ed25519 verifying key.
    pub fn new_ed25519(pk: &ed25519_dalek::VerifyingKey) -> Self {
        let public_key = pk.as_bytes().to_vec();
        Self {
            id: encode(KeyType::Ed25519, &public_key),
            key_type: KeyType::Ed25519,
            public_key,
        }
    }

    /// Return the DID string.
    pub fn as_str(&self) -> &str {
        &self.id
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    /// Raw public key bytes embedded in the DID.
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }
}

impl FromStr for Did {
    type Err = DidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key_type, public_key) = decode(s)?;
        Ok(Self {
            id: s.to_string(),
            key_type,
            public_key,
        })
    }
}

impl TryFrom<String> for Did {
    type Error = DidError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Did> for String {
    fn from(did: Did) -> Self {
        did.id
    }
}

impl AsRef<str> for Did {
    fn as_ref(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}
