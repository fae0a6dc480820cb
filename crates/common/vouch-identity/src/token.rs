//! Compact VC-JWT encoding of a [`Credential`].
//!
//! Payload layout: registered claims `iss`, `sub`, `iat` (plus optional `nbf`,
//! `exp`, `jti`) and a `vc` object carrying `@context`, `type` and
//! `credentialSubject`. The subject DID travels in `sub`, not inside
//! `credentialSubject`.

use crate::vc::{from_numeric_date, CREDENTIALS_V1_CONTEXT, VERIFIABLE_CREDENTIAL_TYPE};
use crate::{Achievement, Credential, CredentialSubject, Did, Issuer};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vouch_crypto::{jws, Algorithm, CompactJws, JwsError, JwsHeader};

/// Structural reasons a token is rejected before any signature check.
#[derive(Debug, Error)]
pub enum MalformedToken {
    #[error(transparent)]
    Structure(#[from] JwsError),

    #[error("missing required claim '{0}'")]
    MissingClaim(&'static str),

    #[error("invalid '{claim}' claim: {reason}")]
    InvalidClaim { claim: &'static str, reason: String },
}

impl MalformedToken {
    fn invalid(claim: &'static str, reason: impl ToString) -> Self {
        MalformedToken::InvalidClaim {
            claim,
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectClaim {
    pub achievement: Achievement,
}

/// The `vc` claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VcClaim {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    #[serde(rename = "type")]
    pub types: Vec<String>,
    #[serde(rename = "credentialSubject")]
    pub credential_subject: SubjectClaim,
}

/// Token payload. Field order here is the wire order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialClaims {
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    pub vc: VcClaim,
}

/// Payload as found on the wire, before required claims are checked.
#[derive(Deserialize)]
struct RawClaims {
    iss: Option<String>,
    sub: Option<String>,
    iat: Option<i64>,
    nbf: Option<i64>,
    exp: Option<i64>,
    jti: Option<String>,
    vc: Option<VcClaim>,
}

impl TryFrom<RawClaims> for CredentialClaims {
    type Error = MalformedToken;

    fn try_from(raw: RawClaims) -> Result<Self, Self::Error> {
        Ok(CredentialClaims {
            iss: raw.iss.ok_or(MalformedToken::MissingClaim("iss"))?,
            sub: raw.sub.ok_or(MalformedToken::MissingClaim("sub"))?,
            iat: raw.iat.ok_or(MalformedToken::MissingClaim("iat"))?,
            nbf: raw.nbf,
            exp: raw.exp,
            jti: raw.jti,
            vc: raw.vc.ok_or(MalformedToken::MissingClaim("vc"))?,
        })
    }
}

impl From<&Credential> for CredentialClaims {
    fn from(credential: &Credential) -> Self {
        let iat = credential.issuance_date.timestamp();
        CredentialClaims {
            iss: credential.issuer.to_string(),
            sub: credential.credential_subject.id.to_string(),
            iat,
            nbf: Some(iat),
            exp: credential.expiration_date.map(|exp| exp.timestamp()),
            jti: credential.id.clone(),
            vc: VcClaim {
                context: credential.context.clone(),
                types: credential.types.clone(),
                credential_subject: SubjectClaim {
                    achievement: credential.credential_subject.achievement.clone(),
                },
            },
        }
    }
}

/// Encode and sign a credential as a compact token.
///
/// `sign_fn` receives the UTF-8 bytes of `header_b64.payload_b64` and returns
/// raw signature bytes for `alg`.
pub fn sign<F>(credential: &Credential, alg: Algorithm, sign_fn: F) -> Result<String, JwsError>
where
    F: FnOnce(&[u8]) -> Vec<u8>,
{
    let claims = CredentialClaims::from(credential);
    jws::sign_compact(&JwsHeader::jwt(alg), &claims, sign_fn)
}

/// Sign a credential with an [`Issuer`] capability.
pub fn issue<I: Issuer + ?Sized>(credential: &Credential, issuer: &I) -> Result<String, JwsError> {
    sign(credential, issuer.algorithm(), |input| issuer.sign(input))
}

/// A structurally valid token whose signature has not been checked.
#[derive(Debug, Clone)]
pub struct ParsedToken {
    jws: CompactJws,
    pub claims: CredentialClaims,
    pub subject: Did,
    pub issued_at: DateTime<Utc>,
    pub not_before: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ParsedToken {
    pub fn header(&self) -> &JwsHeader {
        &self.jws.header
    }

    pub fn signature(&self) -> &[u8] {
        &self.jws.signature
    }

    /// The exact signed bytes, taken from the original segments.
    pub fn signing_input(&self) -> String {
        self.jws.signing_input()
    }

    /// The unverified `iss` claim.
    pub fn issuer(&self) -> &str {
        &self.claims.iss
    }

    /// Rebuild the credential once `issuer` has been resolved from `iss`.
    pub fn credential(&self, issuer: Did) -> Credential {
        Credential {
            context: self.claims.vc.context.clone(),
            types: self.claims.vc.types.clone(),
            id: self.claims.jti.clone(),
            issuer,
            issuance_date: self.issued_at,
            expiration_date: self.expires_at,
            credential_subject: CredentialSubject {
                id: self.subject.clone(),
                achievement: self.claims.vc.credential_subject.achievement.clone(),
            },
        }
    }
}

/// Split and decode a token, checking structure only.
///
/// The `iss` claim is left unvalidated: whether it names a usable issuer is a
/// resolution question, not a parsing one.
pub fn parse(token: &str) -> Result<ParsedToken, MalformedToken> {
    let jws = CompactJws::parse(token)?;
    let raw: RawClaims = jws.payload_json()?;
    let claims = CredentialClaims::try_from(raw)?;

    if claims.iss.is_empty() {
        return Err(MalformedToken::invalid("iss", "issuer must not be empty"));
    }
    let subject: Did = claims
        .sub
        .parse()
        .map_err(|e| MalformedToken::invalid("sub", e))?;

    let issued_at = from_numeric_date("iat", claims.iat).map_err(|e| MalformedToken::invalid("iat", e))?;
    let not_before = claims
        .nbf
        .map(|nbf| from_numeric_date("nbf", nbf))
        .transpose()
        .map_err(|e| MalformedToken::invalid("nbf", e))?;
    let expires_at = claims
        .exp
        .map(|exp| from_numeric_date("exp", exp))
        .transpose()
        .map_err(|e| MalformedToken::invalid("exp", e))?;

    let vc = &claims.vc;
    if !vc.context.iter().any(|c| c == CREDENTIALS_V1_CONTEXT) {
        return Err(MalformedToken::invalid(
            "vc",
            format!("@context must include {}", CREDENTIALS_V1_CONTEXT),
        ));
    }
    if !vc.types.iter().any(|t| t == VERIFIABLE_CREDENTIAL_TYPE) {
        return Err(MalformedToken::invalid(
            "vc",
            format!("type must include {}", VERIFIABLE_CREDENTIAL_TYPE),
        ));
    }
    vc.credential_subject
        .achievement
        .validate()
        .map_err(|e| MalformedToken::invalid("vc", e))?;

    Ok(ParsedToken {
        jws,
        claims,
        subject,
        issued_at,
        not_before,
        expires_at,
    })
}
