use crate::token::{self, MalformedToken, ParsedToken};
use crate::{Credential, Did, ResolutionResult, ResolveError, Resolver};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use thiserror::Error;
use vouch_crypto::{Algorithm, JwsHeader, SignatureError};

/// Default tolerance for clocks running ahead of or behind the issuer.
pub const DEFAULT_CLOCK_SKEW_SECS: i64 = 300;

/// Largest accepted clock skew (one day).
pub const MAX_CLOCK_SKEW_SECS: i64 = 86_400;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("clock skew must be between 0 and 86400 seconds, got {0}")]
pub struct InvalidClockSkew(pub i64);

/// Why a token was rejected. Exactly one reason is reported per attempt.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("malformed token: {0}")]
    MalformedToken(#[from] MalformedToken),

    #[error("issuer '{issuer}' could not be resolved: {source}")]
    UnresolvableIssuer {
        issuer: String,
        #[source]
        source: ResolveError,
    },

    #[error("unsupported algorithm '{0}'")]
    UnsupportedAlgorithm(String),

    #[error("signature is invalid: {0}")]
    SignatureInvalid(#[source] SignatureError),

    #[error("token is not valid before {valid_from} (now {now})")]
    NotYetValid {
        valid_from: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    #[error("token expired at {expired_at} (now {now})")]
    Expired {
        expired_at: DateTime<Utc>,
        now: DateTime<Utc>,
    },
}

impl VerificationError {
    /// Stable machine-readable code for transports and audit records.
    pub fn reason(&self) -> &'static str {
        match self {
            VerificationError::MalformedToken(_) => "malformed_token",
            VerificationError::UnresolvableIssuer { .. } => "unresolvable_issuer",
            VerificationError::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            VerificationError::SignatureInvalid(_) => "signature_invalid",
            VerificationError::NotYetValid { .. } => "not_yet_valid",
            VerificationError::Expired { .. } => "expired",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifierOptions {
    /// Applied to `iat`, `nbf` and `exp`.
    clock_skew: Duration,
}

impl VerifierOptions {
    /// Options tolerating `secs` seconds of skew, in `0..=MAX_CLOCK_SKEW_SECS`.
    pub fn with_clock_skew(secs: i64) -> Result<Self, InvalidClockSkew> {
        if !(0..=MAX_CLOCK_SKEW_SECS).contains(&secs) {
            return Err(InvalidClockSkew(secs));
        }
        Ok(Self {
            clock_skew: Duration::seconds(secs),
        })
    }

    pub fn clock_skew(&self) -> Duration {
        self.clock_skew
    }
}

impl Default for VerifierOptions {
    fn default() -> Self {
        Self {
            clock_skew: Duration::seconds(DEFAULT_CLOCK_SKEW_SECS),
        }
    }
}

/// A credential whose signature and validity window have been checked.
#[derive(Debug, Clone)]
pub struct VerifiedCredential {
    pub credential: Credential,
    pub header: JwsHeader,
    /// Key material the issuer resolved to.
    pub issuer_key: ResolutionResult,
}

/// Verifies tokens against a shared resolver.
#[derive(Debug, Clone)]
pub struct Verifier {
    resolver: Arc<Resolver>,
    options: VerifierOptions,
}

impl Verifier {
    pub fn new(resolver: Arc<Resolver>) -> Self {
        Self {
            resolver,
            options: VerifierOptions::default(),
        }
    }

    pub fn with_options(mut self, options: VerifierOptions) -> Self {
        self.options = options;
        self
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn verify(&self, token: &str) -> Result<VerifiedCredential, VerificationError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify as of `now`.
    pub fn verify_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<VerifiedCredential, VerificationError> {
        verify_with(token, &self.resolver, self.options, now)
    }
}

/// Verify `token` with default options as of the current time.
pub fn verify(token: &str, resolver: &Resolver) -> Result<VerifiedCredential, VerificationError> {
    verify_with(token, resolver, VerifierOptions::default(), Utc::now())
}

fn verify_with(
    token: &str,
    resolver: &Resolver,
    options: VerifierOptions,
    now: DateTime<Utc>,
) -> Result<VerifiedCredential, VerificationError> {
    let parsed = token::parse(token)?;

    let issuer = parsed.issuer();
    let issuer_key =
        resolver
            .resolve(issuer)
            .map_err(|source| VerificationError::UnresolvableIssuer {
                issuer: issuer.to_string(),
                source,
            })?;

    check_signature(&parsed, &issuer_key)?;
    check_validity_window(&parsed, options.clock_skew(), now)?;

    let issuer_did = Did::from_public_key(issuer_key.key_type, &issuer_key.public_key)
        .map_err(|source| VerificationError::UnresolvableIssuer {
            issuer: issuer.to_string(),
            source: source.into(),
        })?;

    Ok(VerifiedCredential {
        credential: parsed.credential(issuer_did),
        header: parsed.header().clone(),
        issuer_key,
    })
}

fn check_signature(
    parsed: &ParsedToken,
    issuer_key: &ResolutionResult,
) -> Result<(), VerificationError> {
    let alg: Algorithm = parsed
        .header()
        .alg
        .parse()
        .map_err(|_| VerificationError::UnsupportedAlgorithm(parsed.header().alg.clone()))?;

    alg.verify(
        issuer_key.key_type,
        &issuer_key.public_key,
        parsed.signing_input().as_bytes(),
        parsed.signature(),
    )
    .map_err(VerificationError::SignatureInvalid)
}

fn check_validity_window(
    parsed: &ParsedToken,
    skew: Duration,
    now: DateTime<Utc>,
) -> Result<(), VerificationError> {
    // Bounds past the representable range never reject.
    if let Some(latest_start) = now.checked_add_signed(skew) {
        for valid_from in std::iter::once(parsed.issued_at).chain(parsed.not_before) {
            if valid_from > latest_start {
                return Err(VerificationError::NotYetValid { valid_from, now });
            }
        }
    }

    if let (Some(expired_at), Some(earliest_end)) =
        (parsed.expires_at, now.checked_sub_signed(skew))
    {
        if expired_at <= earliest_end {
            return Err(VerificationError::Expired { expired_at, now });
        }
    }
    Ok(())
}
