use crate::Did;
use ed25519_dalek::Signer as _;
use k256::ecdsa::signature::Signer as _;
use rand::rngs::OsRng;
use std::fmt;
use thiserror::Error;
use vouch_crypto::{Algorithm, KeyType};
use zeroize::Zeroizing;

/// Length of a raw private scalar.
pub const SECRET_KEY_LENGTH: usize = 32;

/// Error type for private key import. Every variant means the key is invalid.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid private key length: expected {expected_len} bytes, found {found_len} bytes")]
    InvalidLength { expected_len: usize, found_len: usize },

    #[error("invalid private key: scalar is zero or not below the secp256k1 curve order")]
    InvalidScalar,

    #[error("invalid private key hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

#[derive(Clone)]
enum SecretKey {
    Secp256k1(k256::ecdsa::SigningKey),
    Ed25519(ed25519_dalek::SigningKey),
}

/// A signing keypair bound to its `did:key`.
///
/// The secret half never leaves this type except through [`KeyPair::secret_hex`].
#[derive(Clone)]
pub struct KeyPair {
    pub did: Did,
    sk: SecretKey,
}

impl KeyPair {
    /// Derive a secp256k1 keypair from a 32-byte private scalar.
    pub fn derive(secret: &[u8]) -> Result<Self, KeyError> {
        Self::derive_with(KeyType::Secp256k1, secret)
    }

    /// Derive a keypair of `key_type` from 32 bytes of secret material.
    pub fn derive_with(key_type: KeyType, secret: &[u8]) -> Result<Self, KeyError> {
        let bytes: &[u8; SECRET_KEY_LENGTH] =
            secret.try_into().map_err(|_| KeyError::InvalidLength {
                expected_len: SECRET_KEY_LENGTH,
                found_len: secret.len(),
            })?;

        let sk = match key_type {
            KeyType::Secp256k1 => {
                let sk = k256::ecdsa::SigningKey::from_bytes(k256::FieldBytes::from_slice(bytes))
                    .map_err(|_| KeyError::InvalidScalar)?;
                SecretKey::Secp256k1(sk)
            }
            KeyType::Ed25519 => SecretKey::Ed25519(ed25519_dalek::SigningKey::from_bytes(bytes)),
        };
        Ok(Self::from_secret(sk))
    }

    /// Parse a hex-encoded secret, with or without a `0x` prefix.
    pub fn from_hex(key_type: KeyType, secret_hex: &str) -> Result<Self, KeyError> {
        let trimmed = secret_hex.trim();
        let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = Zeroizing::new(hex::decode(trimmed)?);
        Self::derive_with(key_type, &bytes)
    }

    /// Generate a new random secp256k1 keypair.
    pub fn generate() -> Self {
        Self::generate_with(KeyType::Secp256k1)
    }

    /// Generate a new random keypair of `key_type`.
    pub fn generate_with(key_type: KeyType) -> Self {
        let sk = match key_type {
            KeyType::Secp256k1 => SecretKey::Secp256k1(k256::ecdsa::SigningKey::random(&mut OsRng)),
            KeyType::Ed25519 => SecretKey::Ed25519(ed25519_dalek::SigningKey::generate(&mut OsRng)),
        };
        Self::from_secret(sk)
    }

    fn from_secret(sk: SecretKey) -> Self {
        let did = match &sk {
            SecretKey::Secp256k1(sk) => Did::new_secp256k1(sk.verifying_key()),
            SecretKey::Ed25519(sk) => Did::new_ed25519(&sk.verifying_key()),
        };
        Self { did, sk }
    }

    pub fn key_type(&self) -> KeyType {
        self.did.key_type()
    }

    /// Public key bytes (compressed SEC1 for secp256k1).
    pub fn public_key(&self) -> &[u8] {
        self.did.public_key()
    }

    /// JWS algorithm this keypair signs with.
    pub fn algorithm(&self) -> Algorithm {
        Algorithm::for_key_type(self.key_type())
    }

    /// Sign arbitrary bytes, returning the raw 64-byte signature.
    pub fn sign(&self, msg: &[u8]) -> Vec<u8> {
        match &self.sk {
            SecretKey::Secp256k1(sk) => {
                let sig: k256::ecdsa::Signature = sk.sign(msg);
                sig.to_bytes().to_vec()
            }
            SecretKey::Ed25519(sk) => sk.sign(msg).to_bytes().to_vec(),
        }
    }

    /// Verify a signature against `msg`.
    pub fn verify(&self, msg: &[u8], sig: &[u8]) -> bool {
        self.algorithm()
            .verify(self.key_type(), self.public_key(), msg, sig)
            .is_ok()
    }

    /// Return the secret bytes hex-encoded.
    pub fn secret_hex(&self) -> Zeroizing<String> {
        let bytes = match &self.sk {
            SecretKey::Secp256k1(sk) => Zeroizing::new(sk.to_bytes().to_vec()),
            SecretKey::Ed25519(sk) => Zeroizing::new(sk.to_bytes().to_vec()),
        };
        Zeroizing::new(hex::encode(bytes.as_slice()))
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("did", &self.did)
            .finish_non_exhaustive()
    }
}

/// Anything that can attribute a credential to a DID and sign for it.
pub trait Issuer {
    /// The identifier written into the token's `iss` claim.
    fn did(&self) -> &Did;

    /// The algorithm named in the token header.
    fn algorithm(&self) -> Algorithm;

    /// Sign the exact signing input, returning raw signature bytes.
    fn sign(&self, signing_input: &[u8]) -> Vec<u8>;
}

impl Issuer for KeyPair {
    fn did(&self) -> &Did {
        &self.did
    }

    fn algorithm(&self) -> Algorithm {
        KeyPair::algorithm(self)
    }

    fn sign(&self, signing_input: &[u8]) -> Vec<u8> {
        KeyPair::sign(self, signing_input)
    }
}
