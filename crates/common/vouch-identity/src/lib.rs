//! Vouch Identity – self-certifying identifiers and signed credentials.
//!
//! - Supports `did:key` for secp256k1 (`multicodec: 0xe7`) and Ed25519 (`0xed`) keys, base58btc multibase.
//! - Provides `KeyPair` derivation, signing, and the `Issuer` capability.
//! - Builds achievement credentials and encodes them as compact VC-JWTs.
//! - Resolves identifiers through a closed, read-only method registry.
//! - Verifies tokens with one distinguishable failure per rejected attempt.
//! - Zero `unsafe`; no logging, failures are returned as values.

#![forbid(unsafe_code)]

pub mod did;
mod keypair;
mod resolver;
pub mod token;
mod vc;
mod verifier;

pub use did::{Did, DidError};
pub use keypair::{Issuer, KeyError, KeyPair, SECRET_KEY_LENGTH};
pub use resolver::{DidMethod, ResolutionResult, ResolveError, Resolver};
pub use token::{MalformedToken, ParsedToken};
pub use vc::{
    Achievement, Credential, CredentialBuilder, CredentialError, CredentialSubject,
    CREDENTIALS_V1_CONTEXT, DEFAULT_CREDENTIAL_TYPE, MAX_LIFETIME_SECS, VERIFIABLE_CREDENTIAL_TYPE,
};
pub use verifier::{
    verify, InvalidClockSkew, VerificationError, VerifiedCredential, Verifier, VerifierOptions,
    DEFAULT_CLOCK_SKEW_SECS, MAX_CLOCK_SKEW_SECS,
};
pub use vouch_crypto::{Algorithm, KeyType};
