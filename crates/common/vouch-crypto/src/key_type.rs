use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// secp256k1-pub multicodec, unsigned-varint encoded (0xe7).
pub const SECP256K1_MULTICODEC_PREFIX: [u8; 2] = [0xe7, 0x01];
/// ed25519-pub multicodec, unsigned-varint encoded (0xed).
pub const ED25519_MULTICODEC_PREFIX: [u8; 2] = [0xed, 0x01];

pub const SECP256K1_COMPRESSED_KEY_LENGTH: usize = 33;
pub const ED25519_KEY_LENGTH: usize = 32;

/// Errors raised while checking raw public key bytes against a key type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyTypeError {
    #[error("unsupported multicodec prefix {0:02x?}")]
    UnsupportedMulticodec(Vec<u8>),

    #[error("invalid {key_type} key length: expected {expected_len} bytes, found {found_len} bytes")]
    InvalidKeyLength {
        key_type: KeyType,
        expected_len: usize,
        found_len: usize,
    },

    #[error("bytes are not a valid {0} public key")]
    InvalidKeyBytes(KeyType),
}

/// Public key types that can appear inside a `did:key` identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    /// secp256k1 key in compressed SEC1 form.
    Secp256k1,
    Ed25519,
}

impl KeyType {
    /// Multicodec prefix written in front of the raw key bytes.
    pub fn multicodec_prefix(self) -> [u8; 2] {
        match self {
            KeyType::Secp256k1 => SECP256K1_MULTICODEC_PREFIX,
            KeyType::Ed25519 => ED25519_MULTICODEC_PREFIX,
        }
    }

    pub fn key_length(self) -> usize {
        match self {
            KeyType::Secp256k1 => SECP256K1_COMPRESSED_KEY_LENGTH,
            KeyType::Ed25519 => ED25519_KEY_LENGTH,
        }
    }

    /// Identify the key type from the start of a multicodec-tagged buffer.
    pub fn from_multicodec(tagged: &[u8]) -> Result<Self, KeyTypeError> {
        [KeyType::Secp256k1, KeyType::Ed25519]
            .into_iter()
            .find(|kt| tagged.starts_with(&kt.multicodec_prefix()))
            .ok_or_else(|| {
                KeyTypeError::UnsupportedMulticodec(tagged.iter().take(2).copied().collect())
            })
    }

    /// Check that `public_key` is a well-formed key of this type.
    ///
    /// secp256k1 keys must be compressed points on the curve, so each key has
    /// exactly one accepted byte representation.
    pub fn validate_public_key(self, public_key: &[u8]) -> Result<(), KeyTypeError> {
        if public_key.len() != self.key_length() {
            return Err(KeyTypeError::InvalidKeyLength {
                key_type: self,
                expected_len: self.key_length(),
                found_len: public_key.len(),
            });
        }
        match self {
            KeyType::Secp256k1 => {
                if !matches!(public_key[0], 0x02 | 0x03) {
                    return Err(KeyTypeError::InvalidKeyBytes(self));
                }
                k256::PublicKey::from_sec1_bytes(public_key)
                    .map(|_| ())
                    .map_err(|_| KeyTypeError::InvalidKeyBytes(self))
            }
            KeyType::Ed25519 => {
                let mut bytes = [0u8; ED25519_KEY_LENGTH];
                bytes.copy_from_slice(public_key);
                ed25519_dalek::VerifyingKey::from_bytes(&bytes)
                    .map(|_| ())
                    .map_err(|_| KeyTypeError::InvalidKeyBytes(self))
            }
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyType::Secp256k1 => write!(f, "secp256k1"),
            KeyType::Ed25519 => write!(f, "ed25519"),
        }
    }
}
