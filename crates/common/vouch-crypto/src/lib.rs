//! Vouch Crypto – signature primitives shared by the identity layer.
//!
//! - `KeyType`: public key types carried in `did:key` identifiers, with their multicodec tags.
//! - `Algorithm`: JWS algorithms (`ES256K`, `EdDSA`) and raw signature verification.
//! - `jws`: compact `header.payload.signature` encoding with pluggable signing.

#![forbid(unsafe_code)]

mod alg;
pub mod jws;
mod key_type;

pub use alg::{Algorithm, SignatureError, UnknownAlgorithm};
pub use jws::{sign_compact, CompactJws, JwsError, JwsHeader};
pub use key_type::{
    KeyType, KeyTypeError, ED25519_KEY_LENGTH, ED25519_MULTICODEC_PREFIX,
    SECP256K1_COMPRESSED_KEY_LENGTH, SECP256K1_MULTICODEC_PREFIX,
};
