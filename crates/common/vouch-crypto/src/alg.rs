use crate::KeyType;
use signature::Verifier;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from raw signature verification.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("algorithm {alg} cannot be used with a {key_type} key")]
    KeyTypeMismatch { alg: Algorithm, key_type: KeyType },

    #[error("public key bytes are invalid for {0}")]
    InvalidPublicKey(KeyType),

    #[error("signature bytes are malformed: {0}")]
    Malformed(signature::Error),

    #[error("signature does not match the signed input")]
    Mismatch,
}

/// JWS `alg` values understood by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// ECDSA over secp256k1 with SHA-256, 64-byte `r || s`.
    ES256K,
    /// Ed25519.
    EdDSA,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::ES256K => "ES256K",
            Algorithm::EdDSA => "EdDSA",
        }
    }

    /// The single key type this algorithm signs with.
    pub fn key_type(self) -> KeyType {
        match self {
            Algorithm::ES256K => KeyType::Secp256k1,
            Algorithm::EdDSA => KeyType::Ed25519,
        }
    }

    pub fn for_key_type(key_type: KeyType) -> Self {
        match key_type {
            KeyType::Secp256k1 => Algorithm::ES256K,
            KeyType::Ed25519 => Algorithm::EdDSA,
        }
    }

    /// Verify `sig` over `msg` with a raw public key of type `key_type`.
    pub fn verify(
        self,
        key_type: KeyType,
        public_key: &[u8],
        msg: &[u8],
        sig: &[u8],
    ) -> Result<(), SignatureError> {
        if self.key_type() != key_type {
            return Err(SignatureError::KeyTypeMismatch { alg: self, key_type });
        }
        match self {
            Algorithm::ES256K => {
                let vk = k256::ecdsa::VerifyingKey::from_sec1_bytes(public_key)
                    .map_err(|_| SignatureError::InvalidPublicKey(key_type))?;
                let sig = k256::ecdsa::Signature::from_slice(sig)
                    .map_err(SignatureError::Malformed)?;
                vk.verify(msg, &sig).map_err(|_| SignatureError::Mismatch)
            }
            Algorithm::EdDSA => {
                let bytes: &[u8; 32] = public_key
                    .try_into()
                    .map_err(|_| SignatureError::InvalidPublicKey(key_type))?;
                let vk = ed25519_dalek::VerifyingKey::from_bytes(bytes)
                    .map_err(|_| SignatureError::InvalidPublicKey(key_type))?;
                let sig = ed25519_dalek::Signature::from_slice(sig)
                    .map_err(SignatureError::Malformed)?;
                vk.verify(msg, &sig).map_err(|_| SignatureError::Mismatch)
            }
        }
    }
}

/// Returned when a header names an algorithm outside [`Algorithm`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unsupported JWS algorithm '{0}'")]
pub struct UnknownAlgorithm(pub String);

impl FromStr for Algorithm {
    type Err = UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ES256K" => Ok(Algorithm::ES256K),
            "EdDSA" => Ok(Algorithm::EdDSA),
            other => Err(UnknownAlgorithm(other.to_string())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
